// X.500 module - Distinguished names
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

mod name;
pub mod part;

pub use name::DistinguishedName;
pub use part::DnPart;
