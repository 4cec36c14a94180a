//! PostgreSQL dumps via `pg_dump`

use super::DumpStrategy;
use crate::config::{DatabaseEngine, DatabaseTarget, ToolPaths};
use crate::utils::executor::DumpCommand;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostgresStrategy;

impl DumpStrategy for PostgresStrategy {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::PostgreSql
    }

    fn command(&self, target: &DatabaseTarget, tools: &ToolPaths) -> DumpCommand {
        let mut args = vec![
            "--host".to_string(),
            target.host.clone(),
            "--port".to_string(),
            target.port.to_string(),
            "--username".to_string(),
            target.user.clone(),
            "--format=plain".to_string(),
            "--no-owner".to_string(),
            // never prompt; a missing password must fail instead of hanging
            "--no-password".to_string(),
        ];
        args.extend(target.extra_params.iter().cloned());
        // pg_dump takes the database name as its last positional argument
        args.push(target.name.clone());

        let mut env = BTreeMap::new();
        if let Some(password) = &target.password {
            env.insert("PGPASSWORD".to_string(), password.clone());
        }

        DumpCommand {
            program: tools.pg_dump.clone(),
            args,
            env,
            database: target.name.clone(),
        }
    }
}
