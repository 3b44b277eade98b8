// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
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

//! Member registry, overload resolution and lookup caching
//!
//! Host classes declare their callable members explicitly through
//! [`ClassDef`](crate::model::types::ClassDef); this module resolves calls
//! against those declarations.

pub mod cache;
pub mod member;
pub mod resolution;

pub use cache::{CacheStats, GenerationalCache};
pub use member::CandidateMember;
pub use resolution::{MemberResolver, build_parameters, is_assignable_from};
