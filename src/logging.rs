//! Logging macros shared by every module.
//!
//! - Embedded targets (`target_os = "none"`): forwarded to `defmt`.
//! - Host unit tests: printed with `println!`.
//! - Other host builds: arguments are evaluated and discarded.
//!
//! Format strings must stay within the subset both backends accept (plain `{}`), and
//! every argument must implement both `Display` and `defmt::Format`.

macro_rules! servo_info {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        ::defmt::info!($($arg)*);

        #[cfg(all(not(target_os = "none"), test))]
        println!("[INFO] {}", format_args!($($arg)*));

        #[cfg(all(not(target_os = "none"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! servo_debug {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        ::defmt::debug!($($arg)*);

        #[cfg(all(not(target_os = "none"), test))]
        println!("[DEBUG] {}", format_args!($($arg)*));

        #[cfg(all(not(target_os = "none"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! servo_warn {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        ::defmt::warn!($($arg)*);

        #[cfg(all(not(target_os = "none"), test))]
        println!("[WARN] {}", format_args!($($arg)*));

        #[cfg(all(not(target_os = "none"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}
