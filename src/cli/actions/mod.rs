pub mod seed_roles;
pub mod server;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    SeedRoles { dsn: String },
}
