use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(
    aircheck_home: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(home) = aircheck_home {
        return Some(home.join(".env"));
    }
    Some(home_dir?.join("aircheck/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("AIRCHECK_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_aircheck_home() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/srv/aircheck")),
            Some(PathBuf::from("/home/alice")),
        );

        let want = Some(PathBuf::from("/srv/aircheck/.env"));
        assert_eq!(got, want);
    }

    #[test]
    fn fallback_uses_home_when_aircheck_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        let want = Some(PathBuf::from("/home/alice/aircheck/.env"));
        assert_eq!(got, want);
    }
}
