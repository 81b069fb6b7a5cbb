// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod draft;
pub mod editor;
pub mod forms;
pub mod guard;
pub mod ids;
pub mod model;
pub mod notify;
pub mod paging;
pub mod store;
pub mod table;

pub use draft::*;
pub use editor::*;
pub use forms::*;
pub use guard::*;
pub use ids::*;
pub use model::*;
pub use notify::*;
pub use paging::*;
pub use store::*;
pub use table::*;
