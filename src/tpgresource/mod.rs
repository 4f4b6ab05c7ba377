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

//! Helpers shared by every resource: url templates, import ids, labels,
//! timeouts, validators and diff utilities.

pub mod diff;
pub mod import_id;
pub mod labels;
pub mod schema;
pub mod self_link;
pub mod timeouts;
pub mod validation;
pub mod vars;

pub use diff::{force_new, UpdateMask};
pub use import_id::{parse_import_id, ImportId};
pub use timeouts::{ResourceTimeouts, Timeouts, TimeoutsBlock};
pub use vars::{add_query_params, replace_vars, ResourceVars};
