// handlers/mod.rs - HTTP handlers grouped by route family
//
// public: service info, health and login (/ , /health, /auth/*)
// data:   entity CRUD (/api/:entity[/:id])
// find:   search and hash lookup (/api/find/*, /api/lookup/*)

pub mod data;
pub mod find;
pub mod public;
pub mod utils;
