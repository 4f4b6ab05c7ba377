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

use tf_provider::AttributePath;

use crate::utils::DisplayJoinable;

/// Record `name` as requiring replacement when its value changes
pub fn force_new<T: PartialEq>(
    replace: &mut Vec<AttributePath>,
    name: &str,
    prior: &T,
    planned: &T,
) {
    if prior != planned {
        replace.push(AttributePath::new(name.to_owned()));
    }
}

/// API fields sent by a PATCH, serialized as the `updateMask` query parameter
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateMask(Vec<&'static str>);

impl UpdateMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str) {
        if !self.0.contains(&field) {
            self.0.push(field);
        }
    }

    /// Add `field` if `prior` and `planned` differ, and return whether it did
    pub fn push_if_changed<T: PartialEq>(
        &mut self,
        field: &'static str,
        prior: &T,
        planned: &T,
    ) -> bool {
        let changed = prior != planned;
        if changed {
            self.push(field);
        }
        changed
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.0
    }
}

impl std::fmt::Display for UpdateMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join_with(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        let mut mask = UpdateMask::new();
        assert!(mask.is_empty());
        assert!(!mask.push_if_changed("description", &"a", &"a"));
        assert!(mask.push_if_changed("description", &"a", &"b"));
        mask.push("labels");
        mask.push("labels");
        assert_eq!(mask.to_string(), "description,labels");
        assert!(mask.contains("labels"));
    }

    #[test]
    fn replacements() {
        let mut replace = Vec::new();
        force_new(&mut replace, "name", &"hub", &"hub");
        assert!(replace.is_empty());
        force_new(&mut replace, "name", &"hub", &"other");
        assert_eq!(replace.len(), 1);
    }

    #[test]
    fn replacement_names_can_be_built() {
        let name = format!("{}_id", "hub");
        let mut replace = Vec::new();
        force_new(&mut replace, &name, &1, &2);
        assert_eq!(replace.len(), 1);
    }
}
