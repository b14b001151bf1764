pub mod dependencies;
pub mod files;
pub mod grub;
pub mod kdumpctl;
pub mod path;
pub mod systemd;
pub mod uname;
