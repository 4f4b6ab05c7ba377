// This file is part of the terraform-provider-google project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

lazy_static! {
    /// Locks shared by every resource of the provider
    pub static ref MUTEX_STORE: MutexStore = MutexStore::default();
}

/// Named locks serializing mutations of the same parent resource
#[derive(Debug, Default)]
pub struct MutexStore {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

#[derive(Debug)]
pub struct NamedGuard {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for NamedGuard {
    fn drop(&mut self) {
        debug!("Unlocked {:?}", self.name);
    }
}

impl MutexStore {
    /// Wait for the lock called `name`, creating it on first use
    pub async fn lock(&self, name: &str) -> NamedGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());
            locks
                .entry(name.to_owned())
                .or_insert_with(Default::default)
                .clone()
        };
        debug!("Locking {name:?}");
        let guard = lock.lock_owned().await;
        debug!("Locked {name:?}");
        NamedGuard {
            name: name.to_owned(),
            _guard: guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, Instant};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_name_is_serialized() {
        let store = Arc::new(MutexStore::default());
        let start = Instant::now();

        let first = {
            let store = store.clone();
            tokio::spawn(async move {
                let _guard = store.lock("apps/my-project").await;
                sleep(Duration::from_secs(5)).await;
            })
        };
        tokio::task::yield_now().await;
        let second = {
            let store = store.clone();
            tokio::spawn(async move {
                let _guard = store.lock("apps/my-project").await;
                Instant::now()
            })
        };

        first.await.unwrap();
        let acquired = second.await.unwrap();
        assert!(acquired - start >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn different_names_do_not_block() {
        let store = MutexStore::default();
        let _first = store.lock("apps/project-a").await;
        let start = Instant::now();
        let _second = store.lock("apps/project-b").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
