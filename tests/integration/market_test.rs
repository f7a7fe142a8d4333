//! Integration tests for window alignment and market slugs

use chrono::{TimeZone, Utc};
use poly_lock::market::{Asset, GammaResolver, Window, DEFAULT_WINDOW_SECS};

#[test]
fn test_window_slug_follows_window_start() {
    let now = Utc.timestamp_opt(1_767_638_750, 0).unwrap();
    let window = Window::containing(now, DEFAULT_WINDOW_SECS);
    assert_eq!(window.id(), 1_767_638_700);
    assert_eq!(
        GammaResolver::slug_for(Asset::Btc, &window),
        "btc-updown-15m-1767638700"
    );
    assert_eq!(
        GammaResolver::slug_for(Asset::Xrp, &window.next()),
        "xrp-updown-15m-1767639600"
    );
}

#[test]
fn test_consecutive_windows_tile_time() {
    let start = Utc.timestamp_opt(1_767_638_700, 0).unwrap();
    let window = Window::containing(start, DEFAULT_WINDOW_SECS);
    let last_second = window.end() - chrono::Duration::seconds(1);
    assert_eq!(Window::containing(last_second, DEFAULT_WINDOW_SECS), window);
    assert_eq!(Window::containing(window.end(), DEFAULT_WINDOW_SECS), window.next());
    assert_eq!(window.remaining(last_second).num_seconds(), 1);
}
