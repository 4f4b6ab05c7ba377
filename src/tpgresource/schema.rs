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

//! Shorthands for the attributes resources declare over and over

use std::collections::HashMap;

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description};

pub use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};

pub fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &'static str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub fn string(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(AttributeType::String, constraint, description)
}

pub fn bool(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(AttributeType::Bool, constraint, description)
}

pub fn number(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(AttributeType::Number, constraint, description)
}

pub fn string_list(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(
        AttributeType::List(Box::new(AttributeType::String)),
        constraint,
        description,
    )
}

pub fn string_set(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(
        AttributeType::Set(Box::new(AttributeType::String)),
        constraint,
        description,
    )
}

pub fn string_map(constraint: AttributeConstraint, description: &'static str) -> Attribute {
    attribute(
        AttributeType::Map(Box::new(AttributeType::String)),
        constraint,
        description,
    )
}

/// Computed list of objects whose fields are all strings
pub fn computed_objects(fields: &[&str], description: &'static str) -> Attribute {
    let fields: HashMap<String, AttributeType> = fields
        .iter()
        .map(|field| (field.to_string(), AttributeType::String))
        .collect();
    attribute(
        AttributeType::List(Box::new(AttributeType::Object(fields))),
        Computed,
        description,
    )
}

pub fn sensitive(attribute: Attribute) -> Attribute {
    Attribute {
        sensitive: true,
        ..attribute
    }
}

pub fn id() -> Attribute {
    string(Computed, "An identifier for the resource")
}

pub fn project() -> Attribute {
    string(
        OptionalComputed,
        "The project of the resource. Defaults to the provider project.",
    )
}
