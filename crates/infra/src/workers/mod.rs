pub mod revocation_sweeper;
