use super::QueryBuilder;
use crate::error::{MuxError, MuxResult};
use crate::ident;

impl QueryBuilder {
    /// One `CREATE TABLE` per manifest table, qualified with `namespace`.
    ///
    /// Each table's unique integer column becomes its primary key; a table without one is
    /// rejected.
    pub fn create_tables_sql(&self, namespace: &str) -> MuxResult<Vec<String>> {
        ident::validate(namespace)?;

        let mut statements = Vec::new();
        for table in self.model.manifest().tables() {
            let primary = table
                .columns
                .iter()
                .find(|(_, ty)| ty.is_unique())
                .map(|(name, _)| name)
                .ok_or_else(|| {
                    MuxError::schema(format!("primary key not specified for table `{}`", table.name))
                })?;

            let mut defs: Vec<String> = table
                .columns
                .iter()
                .map(|(name, ty)| format!("{} {}", ident::quote(name), ty.sql_definition()))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", ident::quote(primary)));

            statements.push(format!(
                "CREATE TABLE {}.{} ({})",
                ident::quote(namespace),
                ident::quote(&table.name),
                defs.join(", ")
            ));
        }
        Ok(statements)
    }
}
