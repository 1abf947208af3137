pub mod gcs_server;
