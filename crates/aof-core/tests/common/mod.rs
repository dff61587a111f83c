pub mod spectator_server;
