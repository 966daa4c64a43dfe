// Copyright (c) 2026 Glacier Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Protocol-level primitives: wire types, blocks, votes, interning caches,
//! work validation and signing. Everything here is pure domain logic with
//! no I/O.

pub mod block;
pub mod security;
pub mod types;
pub mod uniquer;
pub mod vote;
pub mod work;
