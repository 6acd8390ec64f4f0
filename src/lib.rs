pub use teamdesk_cli::{cli, commands, config, output, run, shell, AppConfig};

pub use teamdesk_core as core;
pub use teamdesk_core::{api, model, services, Dashboard, Session};
