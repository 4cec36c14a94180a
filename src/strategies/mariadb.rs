//! MariaDB / MySQL dumps via `mariadb-dump`

use super::{with_extra_params, DumpStrategy};
use crate::config::{DatabaseEngine, DatabaseTarget, ToolPaths};
use crate::utils::executor::DumpCommand;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MariaDbStrategy;

impl DumpStrategy for MariaDbStrategy {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::MariaDb
    }

    fn command(&self, target: &DatabaseTarget, tools: &ToolPaths) -> DumpCommand {
        let args = vec![
            format!("--host={}", target.host),
            format!("--port={}", target.port),
            format!("--user={}", target.user),
            "--databases".to_string(),
            target.name.clone(),
        ];

        let mut env = BTreeMap::new();
        if let Some(password) = &target.password {
            env.insert("MYSQL_PWD".to_string(), password.clone());
        }

        DumpCommand {
            program: tools.mariadb_dump.clone(),
            args: with_extra_params(args, target),
            env,
            database: target.name.clone(),
        }
    }
}
