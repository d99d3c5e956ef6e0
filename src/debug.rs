//! Filterable debug logging.
//!
//! Categories: FILTER, CACHE, NET, ANALYTICS, ADMIN
//! Enable via: PLATDEX_DEBUG=all or PLATDEX_DEBUG=cache,net

use std::sync::atomic::{AtomicU32, Ordering};

pub mod cat {
    pub const FILTER: u32 = 1 << 0;
    pub const CACHE: u32 = 1 << 1;
    pub const NET: u32 = 1 << 2;
    pub const ANALYTICS: u32 = 1 << 3;
    pub const ADMIN: u32 = 1 << 4;
    pub const ALL: u32 = 0xffff_ffff;
}

static MASK: AtomicU32 = AtomicU32::new(0);

#[inline]
pub fn mask() -> u32 {
    MASK.load(Ordering::Relaxed)
}

#[inline]
pub fn set(mask: u32) {
    MASK.store(mask, Ordering::Relaxed)
}

#[inline]
pub fn is(cat: u32) -> bool {
    (MASK.load(Ordering::Relaxed) & cat) != 0
}

#[inline]
pub fn cat_name(cat: u32) -> &'static str {
    match cat {
        c if c == cat::FILTER => "filter",
        c if c == cat::CACHE => "cache",
        c if c == cat::NET => "net",
        c if c == cat::ANALYTICS => "analytics",
        c if c == cat::ADMIN => "admin",
        _ => "misc",
    }
}

/// Parse a comma-separated category list into a mask.
pub fn parse_list(list: &str) -> u32 {
    let mut m: u32 = 0;
    for tok in list.split(',').map(|s| s.trim().to_ascii_lowercase()) {
        match tok.as_str() {
            "" | "none" => m = 0,
            "all" => m = cat::ALL,
            "filter" => m |= cat::FILTER,
            "cache" => m |= cat::CACHE,
            "net" => m |= cat::NET,
            "analytics" => m |= cat::ANALYTICS,
            "admin" => m |= cat::ADMIN,
            _ => {}
        }
    }
    m
}

#[inline]
pub fn set_from_list(list: &str) {
    set(parse_list(list));
}

pub fn init_from_env_once() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Ok(v) = std::env::var("PLATDEX_DEBUG") {
            set_from_list(&v);
        }
    });
}

#[inline]
pub fn log(cat: u32, msg: impl AsRef<str>) {
    if !is(cat) {
        return;
    }
    eprintln!("[platdex][{}] {}", cat_name(cat), msg.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_combines_categories() {
        assert_eq!(parse_list("cache,net"), cat::CACHE | cat::NET);
        assert_eq!(parse_list(" Analytics "), cat::ANALYTICS);
        assert_eq!(parse_list("all"), cat::ALL);
        assert_eq!(parse_list("cache,none"), 0);
        assert_eq!(parse_list("bogus"), 0);
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(cat_name(cat::ADMIN), "admin");
        assert_eq!(cat_name(cat::ALL), "misc");
    }
}
