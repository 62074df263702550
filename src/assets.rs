use std::path::{Path, PathBuf};

const INSTITUTION_LOGO: &str = "img/logo.jpg";
const NOTICE_BACKGROUND: &str = "img/notice_bg.png";
const COMPANY_LOGO_DIR: &str = "logo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Photo,
    CompanyLogo,
    InstitutionLogo,
    NoticeBackground,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Photo => "photo",
            AssetKind::CompanyLogo => "company_logo",
            AssetKind::InstitutionLogo => "institution_logo",
            AssetKind::NoticeBackground => "notice_background",
        }
    }
}

/// Maps image references on a record to sources the PDF writer can load:
/// a filesystem path or a `data:` URL.
///
/// Uploaded photos and company logos live under `uploads_dir`; the fixed
/// institutional artwork lives under `static_dir`.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    uploads_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

impl AssetResolver {
    pub fn new(uploads_dir: Option<PathBuf>, static_dir: Option<PathBuf>) -> Self {
        Self {
            uploads_dir,
            static_dir,
        }
    }

    pub fn resolve(&self, kind: AssetKind, reference: Option<&str>) -> Option<String> {
        match kind {
            AssetKind::Photo => self.upload(reference?, None),
            AssetKind::CompanyLogo => self.upload(reference?, Some(COMPANY_LOGO_DIR)),
            AssetKind::InstitutionLogo => self.static_asset(INSTITUTION_LOGO),
            AssetKind::NoticeBackground => self.static_asset(NOTICE_BACKGROUND),
        }
    }

    fn upload(&self, reference: &str, subdir: Option<&str>) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if reference.starts_with("data:") {
            return Some(reference.to_string());
        }
        // Only the final path component is honoured so references cannot escape the root.
        let file_name = Path::new(reference).file_name()?;
        let mut path = self.uploads_dir.clone()?;
        if let Some(subdir) = subdir {
            path.push(subdir);
        }
        path.push(file_name);
        Some(path.to_string_lossy().into_owned())
    }

    fn static_asset(&self, relative: &str) -> Option<String> {
        let root = self.static_dir.as_ref()?;
        Some(root.join(relative).to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetResolver {
        AssetResolver::new(Some(PathBuf::from("/srv/uploads")), Some(PathBuf::from("/srv/public")))
    }

    #[test]
    fn uploads_resolve_under_root() {
        let r = resolver();
        assert_eq!(
            r.resolve(AssetKind::Photo, Some("ring.jpg")).as_deref(),
            Some(Path::new("/srv/uploads/ring.jpg").to_str().unwrap())
        );
        assert_eq!(
            r.resolve(AssetKind::CompanyLogo, Some("acme.png")).as_deref(),
            Some(Path::new("/srv/uploads/logo/acme.png").to_str().unwrap())
        );
    }

    #[test]
    fn traversal_is_stripped_to_file_name() {
        let r = resolver();
        let resolved = r.resolve(AssetKind::Photo, Some("../../etc/passwd")).unwrap();
        assert!(resolved.ends_with("passwd"));
        assert!(!resolved.contains(".."));
    }

    #[test]
    fn absent_references_and_roots_resolve_to_none() {
        let r = resolver();
        assert!(r.resolve(AssetKind::Photo, None).is_none());
        assert!(r.resolve(AssetKind::Photo, Some("  ")).is_none());
        let bare = AssetResolver::default();
        assert!(bare.resolve(AssetKind::InstitutionLogo, None).is_none());
        assert!(bare.resolve(AssetKind::Photo, Some("ring.jpg")).is_none());
    }

    #[test]
    fn data_urls_pass_through() {
        let bare = AssetResolver::default();
        let url = "data:image/png;base64,AAAA";
        assert_eq!(bare.resolve(AssetKind::Photo, Some(url)).as_deref(), Some(url));
    }
}
