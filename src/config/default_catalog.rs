use crate::config::catalog::{CommandCatalog, CommandCatalogEntry, CommandKind};

impl CommandCatalog {
    /// Catalog written by `init-catalog`: incremental syslog plus crash context
    pub fn default_catalog() -> Self {
        CommandCatalog::new(vec![
            CommandCatalogEntry::new("show logging", CommandKind::Logging).with_literals(&[
                "Traceback",
                "%OS-SYSMGR-.-PROC_RESTART",
                "FAULT_MAJOR",
            ]),
            CommandCatalogEntry::new("show context", CommandKind::Command)
                .with_literals(&["Crash Reason"]),
            CommandCatalogEntry::new("show processes blocked", CommandKind::Command),
        ])
    }
}
