//! SQL Server dumps via `mssql-scripter`

use super::{with_extra_params, DumpStrategy};
use crate::config::{DatabaseEngine, DatabaseTarget, ToolPaths};
use crate::utils::executor::DumpCommand;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MssqlStrategy;

impl DumpStrategy for MssqlStrategy {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Mssql
    }

    fn command(&self, target: &DatabaseTarget, tools: &ToolPaths) -> DumpCommand {
        let args = vec![
            "-S".to_string(),
            format!("{},{}", target.host, target.port),
            "-d".to_string(),
            target.name.clone(),
            "-U".to_string(),
            target.user.clone(),
            "--schema-and-data".to_string(),
        ];

        let mut env = BTreeMap::new();
        if let Some(password) = &target.password {
            env.insert("MSSQL_SCRIPTER_PASSWORD".to_string(), password.clone());
        }

        DumpCommand {
            program: tools.mssql_scripter.clone(),
            args: with_extra_params(args, target),
            env,
            database: target.name.clone(),
        }
    }
}
