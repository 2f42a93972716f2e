//! Configuration: pipeline tunables, the command catalog and the binding
//! descriptor that yields SSH targets.

mod binding;
mod catalog;
mod default_catalog;
mod harvest_config;

pub use binding::{Binding, BindingDevice, DialOptions, TargetRegistry};

pub use catalog::{CommandCatalog, CommandCatalogEntry, CommandKind, ErrorPattern};

pub use harvest_config::{load_or_default, HarvestConfig};
