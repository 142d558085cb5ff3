pub mod cmd_enums;
