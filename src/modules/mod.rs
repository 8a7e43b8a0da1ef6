pub mod conversation {
    pub mod schema;
    pub mod model;
    pub mod repository;
    pub mod repository_pg;
    #[cfg(test)]
    pub mod repository_memory;
    pub mod handle;
    pub mod service;
    pub mod route;
}

pub mod message {
    pub mod schema;
    pub mod model;
    pub mod repository;
    pub mod repository_pg;
    #[cfg(test)]
    pub mod repository_memory;
    pub mod handle;
    pub mod service;
    pub mod route;
}

pub mod profile;
pub mod realtime;
pub mod websocket;
