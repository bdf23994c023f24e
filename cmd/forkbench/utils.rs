use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    path::Path,
};

pub fn parse_socket_addr(addr: &str, port: &str) -> io::Result<SocketAddr> {
    // NOTE: this blocks until hostname can be resolved
    format!("{addr}:{port}")
        .to_socket_addrs()?
        .next()
        .ok_or(io::Error::new(
            io::ErrorKind::NotFound,
            "Failed to parse socket address",
        ))
}

pub fn is_memory_datadir(datadir: &Path) -> bool {
    datadir.as_os_str() == "memory"
}

/// Creates the data directory if it does not exist yet.
pub fn init_datadir(datadir: &Path) -> io::Result<()> {
    if is_memory_datadir(datadir) {
        return Ok(());
    }
    std::fs::create_dir_all(datadir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_datadir_is_recognised() {
        assert!(is_memory_datadir(Path::new("memory")));
        assert!(!is_memory_datadir(Path::new("./memory-db")));
    }

    #[test]
    fn socket_addr_from_parts() {
        let addr = parse_socket_addr("127.0.0.1", "5000").unwrap();
        assert_eq!(addr.port(), 5000);
        assert!(parse_socket_addr("127.0.0.1", "not-a-port").is_err());
    }
}
