pub mod models {
    pub mod parkendd;
}

pub mod client;
pub mod config;
pub mod db {
    pub mod models;
    pub mod store;
}
pub mod env_file;
pub mod schema;
pub mod services {
    pub mod fake_data;
    pub mod normalize;
    pub mod poll;
    pub mod ticker;
}
