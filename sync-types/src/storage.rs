//! Derived storage usage snapshot.

use serde::{Deserialize, Serialize};

/// Number of catalog records per content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    /// Courses.
    pub courses: usize,
    /// Lessons.
    pub lessons: usize,
    /// Labs.
    pub labs: usize,
    /// Assessments.
    pub assessments: usize,
}

impl ItemCounts {
    /// Sum over all types.
    pub fn total(&self) -> usize {
        self.courses + self.lessons + self.labs + self.assessments
    }
}

/// Free and total bytes of the device volume holding the blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpace {
    /// Bytes available to the app.
    pub available: u64,
    /// Volume capacity in bytes.
    pub total: u64,
}

/// Read-only view over the catalog and the blob store. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    /// Bytes used by downloaded blobs.
    pub total_bytes_used: u64,
    /// Records per content type.
    pub counts: ItemCounts,
    /// Free bytes on the device, when known.
    pub device_free: Option<u64>,
    /// Device capacity, when known.
    pub device_total: Option<u64>,
    /// `total_bytes_used` as a percentage of device capacity (0 when unknown).
    pub percent_used: f64,
}

impl StorageInfo {
    /// Build a snapshot from raw measurements.
    pub fn new(total_bytes_used: u64, counts: ItemCounts, disk: Option<DiskSpace>) -> Self {
        let percent_used = match disk {
            Some(space) if space.total > 0 => total_bytes_used as f64 / space.total as f64 * 100.0,
            _ => 0.0,
        };
        Self {
            total_bytes_used,
            counts,
            device_free: disk.map(|d| d.available),
            device_total: disk.map(|d| d.total),
            percent_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_used_from_disk_total() {
        let info = StorageInfo::new(
            250,
            ItemCounts::default(),
            Some(DiskSpace {
                available: 500,
                total: 1000,
            }),
        );
        assert_eq!(info.percent_used, 25.0);
        assert_eq!(info.device_free, Some(500));
    }

    #[test]
    fn unknown_disk_reports_zero_percent() {
        let info = StorageInfo::new(250, ItemCounts::default(), None);
        assert_eq!(info.percent_used, 0.0);
        assert!(info.device_total.is_none());
    }

    #[test]
    fn counts_total() {
        let counts = ItemCounts {
            courses: 1,
            lessons: 4,
            labs: 2,
            assessments: 0,
        };
        assert_eq!(counts.total(), 7);
    }
}
