use std::path::PathBuf;

pub fn absolute_path(path: PathBuf) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::absolute_path;
    use std::path::PathBuf;

    #[test]
    fn keep_absolute_path() {
        let path = PathBuf::from("/opt/terraform");
        assert_eq!(absolute_path(path.clone()).unwrap(), path);
    }

    #[test]
    fn resolve_relative_path() {
        let path = absolute_path(PathBuf::from("terraform")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("terraform"));
    }
}
