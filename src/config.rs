//! Centralized configuration and builder (§A.3), mirroring the
//! teacher's env-first `QuiverConfig`/`DbBuilder` pair: tunables read
//! from environment variables by default, overridable through a
//! fluent builder before `BTreeIndex::open`/`create`.

use std::fmt;

#[derive(Clone, Debug)]
pub struct BtreeConfig {
    /// Whether to fsync data segments on every page write, besides the
    /// WAL's own per-system-operation fsync.
    /// Env: BT_DATA_FSYNC (default true; "0|false|off|no" => false)
    pub data_fsync: bool,

    /// Page cache size in pages (0 disables).
    /// Env: BT_PAGE_CACHE_PAGES (default 256)
    pub page_cache_pages: usize,

    /// Overflow threshold in bytes; an object that would push a leaf
    /// record past this size is moved into the overflow-OID chain
    /// instead (§4.9). Env: BT_OVF_THRESHOLD_BYTES (default page_size/4).
    pub ovf_threshold_bytes: Option<usize>,

    /// Default split pivot for a newly created node (§4.4), before any
    /// operation has contributed to its running average.
    /// Env: BT_SPLIT_PIVOT_DEFAULT (default 0.5)
    pub split_pivot_default: f32,

    /// A node below this load factor is a merge *candidate* (§4.5);
    /// whether the merge actually proceeds also depends on the sibling.
    /// Env: BT_MERGE_CAN_THRESHOLD (default 0.33)
    pub merge_can_threshold: f32,

    /// A node below this load factor *forces* a merge attempt even
    /// without an explicit delete triggering one.
    /// Env: BT_MERGE_FORCE_THRESHOLD (default 0.66)
    pub merge_force_threshold: f32,

    /// A merge is rejected if the combined node would waste more than
    /// this multiple of one page's worth of alignment padding.
    /// Env: BT_MAXMERGE_ALIGN_WASTE (default 1.3)
    pub maxmerge_align_waste: f32,

    /// Keys longer than this are pushed to the overflow-key file
    /// rather than stored in-page.
    /// Env: BT_MAX_KEYLEN_INPAGE (default 1024)
    pub btree_max_keylen_inpage: usize,

    /// Caps the number of inline objects a fixed-size leaf record may
    /// carry before its tail is redirected into an overflow-OID chain.
    /// Env: BT_MAX_OIDLEN_INPAGE (default 64)
    pub btree_max_oidlen_inpage: usize,
}

impl Default for BtreeConfig {
    fn default() -> Self {
        Self {
            data_fsync: true,
            page_cache_pages: 256,
            ovf_threshold_bytes: None,
            split_pivot_default: 0.5,
            merge_can_threshold: 0.33,
            merge_force_threshold: 0.66,
            maxmerge_align_waste: 1.3,
            btree_max_keylen_inpage: 1024,
            btree_max_oidlen_inpage: 64,
        }
    }
}

impl BtreeConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BT_DATA_FSYNC") {
            let s = v.trim().to_ascii_lowercase();
            cfg.data_fsync = !(s == "0" || s == "false" || s == "off" || s == "no");
        }
        if let Ok(v) = std::env::var("BT_PAGE_CACHE_PAGES") {
            if let Ok(n) = v.trim().parse() {
                cfg.page_cache_pages = n;
            }
        }
        if let Ok(v) = std::env::var("BT_OVF_THRESHOLD_BYTES") {
            if let Ok(n) = v.trim().parse() {
                cfg.ovf_threshold_bytes = Some(n);
            }
        }
        if let Ok(v) = std::env::var("BT_SPLIT_PIVOT_DEFAULT") {
            if let Ok(n) = v.trim().parse() {
                cfg.split_pivot_default = n;
            }
        }
        if let Ok(v) = std::env::var("BT_MERGE_CAN_THRESHOLD") {
            if let Ok(n) = v.trim().parse() {
                cfg.merge_can_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("BT_MERGE_FORCE_THRESHOLD") {
            if let Ok(n) = v.trim().parse() {
                cfg.merge_force_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("BT_MAXMERGE_ALIGN_WASTE") {
            if let Ok(n) = v.trim().parse() {
                cfg.maxmerge_align_waste = n;
            }
        }
        if let Ok(v) = std::env::var("BT_MAX_KEYLEN_INPAGE") {
            if let Ok(n) = v.trim().parse() {
                cfg.btree_max_keylen_inpage = n;
            }
        }
        if let Ok(v) = std::env::var("BT_MAX_OIDLEN_INPAGE") {
            if let Ok(n) = v.trim().parse() {
                cfg.btree_max_oidlen_inpage = n;
            }
        }
        cfg
    }

    pub fn ovf_threshold_for(&self, page_size: usize) -> usize {
        self.ovf_threshold_bytes.unwrap_or(page_size / 4)
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    pub fn with_page_cache_pages(mut self, pages: usize) -> Self {
        self.page_cache_pages = pages;
        self
    }

    pub fn with_ovf_threshold_bytes(mut self, thr: Option<usize>) -> Self {
        self.ovf_threshold_bytes = thr;
        self
    }
}

impl fmt::Display for BtreeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BtreeConfig {{ data_fsync: {}, page_cache_pages: {}, merge_can: {}, merge_force: {} }}",
            self.data_fsync, self.page_cache_pages, self.merge_can_threshold, self.merge_force_threshold
        )
    }
}

/// Fluent builder producing a `BtreeConfig`, the way `DbBuilder` feeds
/// the teacher's `Db::open`.
#[derive(Clone, Debug, Default)]
pub struct BtreeIndexBuilder {
    cfg: BtreeConfig,
    page_size: u32,
}

impl BtreeIndexBuilder {
    pub fn new() -> Self {
        BtreeIndexBuilder {
            cfg: BtreeConfig::from_env(),
            page_size: crate::consts::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page_size(mut self, ps: u32) -> Self {
        self.page_size = ps;
        self
    }

    pub fn data_fsync(mut self, on: bool) -> Self {
        self.cfg.data_fsync = on;
        self
    }

    pub fn page_cache_pages(mut self, pages: usize) -> Self {
        self.cfg.page_cache_pages = pages;
        self
    }

    pub fn ovf_threshold_bytes(mut self, thr: Option<usize>) -> Self {
        self.cfg.ovf_threshold_bytes = thr;
        self
    }

    pub fn merge_thresholds(mut self, can: f32, force: f32) -> Self {
        self.cfg.merge_can_threshold = can;
        self.cfg.merge_force_threshold = force;
        self
    }

    pub fn build_config(self) -> (BtreeConfig, u32) {
        (self.cfg, self.page_size)
    }
}
