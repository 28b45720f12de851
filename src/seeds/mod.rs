pub mod super_admin_seed;
