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

//! Binary wire format: header, message payloads, byte-exact codec, and the
//! fixed-size-per-type parser.

pub mod codec;
pub mod header;
pub mod messages;
pub mod parser;

pub use header::{Extensions, MessageHeader, MessageType, HEADER_SIZE};
pub use messages::Message;
pub use parser::{MessageVisitor, NetworkContext, ParseStatus};
