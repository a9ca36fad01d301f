#![allow(dead_code)]

use docbridge::{memory::MemoryDriver, prelude::*};

pub const DATABASE: &str = "blog";

pub fn users() -> CollectionDefinition {
    CollectionDefinition::new("users")
        .attribute("email", AttributeDefinition::new("string").unique())
        .attribute("name", AttributeDefinition::new("string").indexed())
}

pub fn posts() -> CollectionDefinition {
    CollectionDefinition::new("posts")
        .attribute("slug", AttributeDefinition::new("string").primary_key())
        .attribute("author", AttributeDefinition::new("string").indexed())
        .attribute("title", AttributeDefinition::new("string").required())
}

/// A collection without derived indexes, so registering it leaves the store untouched.
pub fn drafts() -> CollectionDefinition {
    CollectionDefinition::new("drafts")
        .attribute("title", AttributeDefinition::new("string"))
}

pub fn config(identity: &str) -> ConnectionConfig {
    ConnectionConfig::builder(identity).database(DATABASE).build()
}

pub fn read_only_config(identity: &str) -> ConnectionConfig {
    ConnectionConfig::builder(identity)
        .database(DATABASE)
        .read_only(true)
        .build()
}

/// A registry with a writable `default` connection holding users, posts and drafts.
pub async fn registry() -> Registry<MemoryDriver> {
    let registry = Registry::new(MemoryDriver::new());

    registry
        .register_connection(config("default"), vec![users(), posts(), drafts()])
        .await
        .unwrap();

    registry
}
