/// Privilege checks for the disk utility
///
/// Erasing removable media usually works for the console user, but some
/// volumes need root. The status is logged at startup so failed formats can be
/// diagnosed from the log.

/// Check if the current process is running as root
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

/// Display elevation status information
pub fn get_elevation_status() -> String {
    if is_elevated() {
        "Running as root".to_string()
    } else {
        "Not running as root. The disk utility may ask for permission or refuse some volumes."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_status() {
        let status = get_elevation_status();
        println!("Elevation status: {}", status);
        assert!(!status.is_empty());
        assert_eq!(status == "Running as root", is_elevated());
    }
}
