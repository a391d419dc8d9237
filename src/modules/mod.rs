pub mod books;

use std::sync::Arc;

use bookshelf_db::{Database, DatabaseModule};
use bookshelf_kernel::{settings::Settings, ModuleRegistry};

use books::store::MongoBookStore;

/// Register the database lifecycle and every project module with the registry
pub fn register_all(registry: &mut ModuleRegistry, database: &Database, settings: &Settings) {
    registry.register_core(Arc::new(DatabaseModule::new(database.clone())));

    let store = Arc::new(MongoBookStore::new(database, &settings.database.collection));
    registry.register_custom(books::create_module(
        store,
        settings.server.expose_store_errors,
    ));
}
