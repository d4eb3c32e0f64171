pub use sea_orm_migration::prelude::*;

mod m20240101_000001_accounts;
mod m20240101_000002_crm;
mod m20240101_000003_admin_claim;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_accounts::Migration),
            Box::new(m20240101_000002_crm::Migration),
            Box::new(m20240101_000003_admin_claim::Migration),
        ]
    }
}
