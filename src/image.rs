use std::collections::BTreeMap;
use std::path::PathBuf;


/// Immutable record of a built image
///
/// The tree at `rootfs` is the lower layer of every container started
/// from the image and is never written after the build.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    /// User-supplied label, several images may share it
    pub name: String,
    pub rootfs: PathBuf,
    /// Seconds since the Unix epoch
    pub created: u64,
    /// Reserved for annotations, nothing fills it in yet
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}
