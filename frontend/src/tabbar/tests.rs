use super::*;
use crate::error::ConsoleError;
use crate::notify::{Notice, RecordingNotifier};
use crate::platform::InstantDelay;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::rc::Weak;

// =========================================================
// 测试环境
// =========================================================

/// 记录导航并把当前路由切换到目标
struct MockNavigator {
    current: RefCell<RouteLocation>,
    replaced: RefCell<Vec<String>>,
}

impl MockNavigator {
    fn at(route: RouteLocation) -> Self {
        Self {
            current: RefCell::new(route),
            replaced: RefCell::new(Vec::new()),
        }
    }

    fn replaced(&self) -> Vec<String> {
        self.replaced.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Navigator for MockNavigator {
    fn current_route(&self) -> RouteLocation {
        self.current.borrow().clone()
    }

    async fn push(&self, target: NavigationTarget) -> crate::error::Result<RouteLocation> {
        self.replace(target).await
    }

    async fn replace(&self, target: NavigationTarget) -> crate::error::Result<RouteLocation> {
        if target.path == "/unreachable" {
            return Err(ConsoleError::Navigation("blocked".into()));
        }
        let full_path = target.full_path();
        self.replaced.borrow_mut().push(full_path.clone());
        let route = RouteLocation {
            name: target.path.trim_start_matches('/').to_string(),
            path: target.path.clone(),
            full_path,
            query: target.query.clone(),
            ..Default::default()
        };
        *self.current.borrow_mut() = route.clone();
        Ok(route)
    }
}

#[derive(Default)]
struct RecordingOpener {
    opened: RefCell<Vec<String>>,
}

impl WindowOpener for RecordingOpener {
    fn open(&self, url: &str) {
        self.opened.borrow_mut().push(url.to_string());
    }
}

/// 在等待期间记录标签页状态
#[derive(Default)]
struct SnapshotDelay {
    store: RefCell<Weak<TabbarStore>>,
    seen: RefCell<Vec<(bool, Vec<String>, Vec<String>)>>,
}

#[async_trait(?Send)]
impl Delay for SnapshotDelay {
    async fn sleep(&self, _duration: Duration) {
        if let Some(store) = self.store.borrow().upgrade() {
            self.seen.borrow_mut().push((
                store.render_route_view(),
                store.exclude_cached_tabs(),
                store.cached_tabs(),
            ));
        }
    }
}

struct TestContext {
    notifier: Rc<RecordingNotifier>,
    store: Rc<TabbarStore>,
    events: Rc<RefCell<Vec<TabbarEvent>>>,
}

impl TestContext {
    fn new() -> Self {
        Self::with_delay(Rc::new(InstantDelay::new()))
    }

    fn with_delay(delay: Rc<dyn Delay>) -> Self {
        let notifier = Rc::new(RecordingNotifier::new());
        let store = Rc::new(TabbarStore::new(
            notifier.clone(),
            delay,
            Duration::from_millis(200),
        ));
        let events = Rc::new(RefCell::new(Vec::new()));
        {
            let events = events.clone();
            store.subscribe(move |e| events.borrow_mut().push(e.clone()));
        }
        Self {
            notifier,
            store,
            events,
        }
    }

    fn open(&self, route: RouteLocation) -> Tab {
        self.store.add_tab(Tab::from_route(&route))
    }

    fn keys(&self) -> Vec<String> {
        self.store.tabs().into_iter().map(|t| t.key).collect()
    }

    fn raw_keys(&self) -> Vec<String> {
        self.store.raw_tabs().into_iter().map(|t| t.key).collect()
    }
}

fn route_with(name: &str, path: &str, meta: RouteMeta) -> RouteLocation {
    let target = NavigationTarget::parse(path);
    RouteLocation {
        name: name.to_string(),
        path: target.path.clone(),
        full_path: target.full_path(),
        query: target.query,
        matched: vec![
            MatchedRoute {
                name: "root".into(),
                path: "/".into(),
                meta: RouteMeta::default(),
            },
            MatchedRoute {
                name: name.to_string(),
                path: target.path,
                meta: meta.clone(),
            },
        ],
        meta,
        ..Default::default()
    }
}

fn route(path: &str) -> RouteLocation {
    route_with(path.trim_start_matches('/'), path, RouteMeta::default())
}

fn keep_alive(path: &str) -> RouteLocation {
    route_with(
        path.trim_start_matches('/'),
        path,
        RouteMeta {
            keep_alive: Some(true),
            ..Default::default()
        },
    )
}

fn pinned(path: &str, order: i32) -> RouteLocation {
    route_with(
        path.trim_start_matches('/'),
        path,
        RouteMeta {
            affix_tab: Some(true),
            affix_tab_order: Some(order),
            ..Default::default()
        },
    )
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =========================================================
// key 计算
// =========================================================

#[test]
fn key_prefers_page_key_then_full_path() {
    let with_page_key = route("/report?pageKey=monthly&pageKey=weekly&x=1");
    assert_eq!(tab_key_of(&with_page_key), "monthly");

    let plain = route("/report?x=1");
    assert_eq!(tab_key_of(&plain), "/report?x=1");

    let path_only = route_with(
        "report",
        "/report?x=1",
        RouteMeta {
            full_path_key: Some(false),
            ..Default::default()
        },
    );
    assert_eq!(tab_key_of(&path_only), "/report");
}

#[test]
fn key_is_url_decoded_or_kept_raw() {
    let mut encoded = route("/docs/a%20b");
    assert_eq!(tab_key_of(&encoded), "/docs/a b");

    encoded.full_path = "/docs/%E0%A4%A".into();
    assert_eq!(tab_key_of(&encoded), "/docs/%E0%A4%A");
}

// =========================================================
// 打开标签页
// =========================================================

#[test]
fn hidden_routes_are_returned_but_not_recorded() {
    let ctx = TestContext::new();
    let hidden = route_with(
        "preview",
        "/preview",
        RouteMeta {
            hide_in_tab: Some(true),
            ..Default::default()
        },
    );
    let returned = ctx.open(hidden);
    assert_eq!(returned.key, "/preview");

    let mut nested = route("/system/secret");
    nested.matched[0].meta.hide_in_tab = Some(true);
    ctx.open(nested);

    assert!(ctx.store.raw_tabs().is_empty());
}

#[test]
fn adding_an_open_tab_merges_in_place() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(route("/b"));
    let a = ctx.store.get_tab_by_key("/a").unwrap();
    ctx.store.pin_tab(&a);
    ctx.store.set_tab_title(&a, "Custom");

    let mut again = route("/a");
    again.meta.title = Some("Fresh".into());
    again.meta.affix_tab = Some(false);
    let merged = ctx.open(again);

    assert_eq!(ctx.raw_keys(), keys(&["/a", "/b"]));
    assert!(merged.is_affix());
    assert_eq!(merged.meta.new_tab_title.as_deref(), Some("Custom"));
    assert_eq!(merged.meta.title.as_deref(), Some("Fresh"));
    assert_eq!(merged.title(), "Custom");
}

#[test]
fn repeated_adds_are_idempotent() {
    let ctx = TestContext::new();
    for _ in 0..3 {
        ctx.open(route("/a"));
        ctx.open(route("/b"));
    }
    assert_eq!(ctx.raw_keys(), keys(&["/a", "/b"]));
}

#[test]
fn global_max_evicts_oldest_unpinned_tab() {
    let ctx = TestContext::new();
    ctx.store.set_max_count(3);
    ctx.open(pinned("/home", 0));
    ctx.open(route("/a"));
    ctx.open(route("/b"));
    ctx.open(route("/c"));

    assert_eq!(ctx.raw_keys(), keys(&["/home", "/b", "/c"]));
    for path in ["/d", "/e", "/f"] {
        ctx.open(route(path));
        assert!(ctx.store.raw_tabs().len() <= 3);
    }
    assert_eq!(ctx.raw_keys(), keys(&["/home", "/e", "/f"]));
}

#[test]
fn per_route_max_evicts_oldest_with_same_name() {
    let ctx = TestContext::new();
    let detail = |id: u32| {
        route_with(
            "user-detail",
            &format!("/system/user/{id}"),
            RouteMeta {
                max_num_of_open_tab: Some(2),
                ..Default::default()
            },
        )
    };
    ctx.open(detail(1));
    ctx.open(route("/other"));
    ctx.open(detail(2));
    ctx.open(detail(3));

    assert_eq!(
        ctx.raw_keys(),
        keys(&["/other", "/system/user/2", "/system/user/3"])
    );
}

#[test]
fn pinned_tabs_lead_display_order_by_affix_order() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(pinned("/p2", 2));
    ctx.open(route("/b"));
    ctx.open(pinned("/p1", 1));
    ctx.open(pinned("/p1b", 1));

    assert_eq!(ctx.keys(), keys(&["/p1", "/p1b", "/p2", "/a", "/b"]));
    assert_eq!(
        ctx.store
            .affix_tabs()
            .into_iter()
            .map(|t| t.key)
            .collect::<Vec<_>>(),
        keys(&["/p1", "/p1b", "/p2"])
    );
}

#[test]
fn set_affix_tabs_pins_each_route() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.store.set_affix_tabs(vec![route("/dashboard"), route("/workbench")]);
    assert_eq!(ctx.keys(), keys(&["/dashboard", "/workbench", "/a"]));
    assert!(ctx.store.tabs()[0].is_affix());
}

// =========================================================
// 缓存集合
// =========================================================

#[test]
fn cache_follows_keep_alive_tabs() {
    let ctx = TestContext::new();
    ctx.open(keep_alive("/a"));
    ctx.open(route("/b"));
    let mut nested = keep_alive("/system/user");
    nested.matched.insert(
        1,
        MatchedRoute {
            name: "system".into(),
            path: "/system".into(),
            meta: RouteMeta::default(),
        },
    );
    ctx.open(nested);

    assert_eq!(ctx.store.cached_tabs(), keys(&["a", "system", "system/user"]));

    let a = ctx.store.get_tab_by_key("/a").unwrap();
    ctx.store.close_other_tabs(&a);
    assert_eq!(ctx.store.cached_tabs(), keys(&["a"]));
}

#[test]
fn max_one_keeps_only_the_newest_tab_and_clears_cache() {
    let ctx = TestContext::new();
    ctx.store.set_max_count(1);
    ctx.open(keep_alive("/a"));
    assert_eq!(ctx.store.cached_tabs(), keys(&["a"]));

    ctx.open(route("/b"));

    assert_eq!(ctx.raw_keys(), keys(&["/b"]));
    assert!(ctx.store.cached_tabs().is_empty());
}

// =========================================================
// 关闭标签页
// =========================================================

#[tokio::test]
async fn closing_an_inactive_tab_removes_it_directly() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    let b = ctx.open(route("/b"));
    let nav = MockNavigator::at(route("/a"));

    ctx.store.close_tab(&b, &nav).await.unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/a"]));
    assert!(nav.replaced().is_empty());
}

#[tokio::test]
async fn closing_the_active_tab_moves_to_a_neighbour_first() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    let b = ctx.open(route("/b"));
    let c = ctx.open(route("/c"));

    let nav = MockNavigator::at(route("/b"));
    ctx.store.close_tab(&b, &nav).await.unwrap();
    assert_eq!(nav.replaced(), keys(&["/c"]));
    assert_eq!(ctx.raw_keys(), keys(&["/a", "/c"]));

    let nav = MockNavigator::at(route("/c"));
    ctx.store.close_tab(&c, &nav).await.unwrap();
    assert_eq!(nav.replaced(), keys(&["/a"]));
    assert_eq!(ctx.raw_keys(), keys(&["/a"]));
}

#[tokio::test]
async fn closing_the_sole_tab_is_a_no_op() {
    let ctx = TestContext::new();
    let a = ctx.open(route("/a"));
    let nav = MockNavigator::at(route("/a"));

    ctx.store.close_tab(&a, &nav).await.unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/a"]));
    assert!(nav.replaced().is_empty());
}

#[tokio::test]
async fn failed_navigation_keeps_the_tab() {
    let ctx = TestContext::new();
    let a = ctx.open(route("/a"));
    ctx.open(route("/unreachable"));
    let nav = MockNavigator::at(route("/a"));

    let err = ctx.store.close_tab(&a, &nav).await.unwrap_err();

    assert!(matches!(err, ConsoleError::Navigation(_)));
    assert_eq!(ctx.raw_keys(), keys(&["/a", "/unreachable"]));
}

#[tokio::test]
async fn pinned_tabs_are_never_closed() {
    let ctx = TestContext::new();
    let home = ctx.open(pinned("/home", 0));
    ctx.open(route("/a"));
    let nav = MockNavigator::at(route("/home"));

    ctx.store.close_tab(&home, &nav).await.unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/home", "/a"]));
    assert!(nav.replaced().is_empty());
}

#[tokio::test]
async fn close_by_key_decodes_the_key() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(route("/docs/a%20b"));
    let nav = MockNavigator::at(route("/a"));

    ctx.store
        .close_tab_by_key("%2Fdocs%2Fa%20b", &nav)
        .await
        .unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/a"]));
}

#[tokio::test]
async fn close_all_keeps_pinned_tabs_and_navigates_to_the_first() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(pinned("/home", 0));
    ctx.open(route("/b"));
    let nav = MockNavigator::at(route("/b"));

    ctx.store.close_all_tabs(&nav).await.unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/home"]));
    assert_eq!(nav.replaced(), keys(&["/home"]));
}

#[tokio::test]
async fn close_all_without_pins_keeps_the_first_tab() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(route("/b"));
    let nav = MockNavigator::at(route("/b"));

    ctx.store.close_all_tabs(&nav).await.unwrap();

    assert_eq!(ctx.raw_keys(), keys(&["/a"]));
    assert_eq!(nav.replaced(), keys(&["/a"]));
}

#[test]
fn close_left_right_and_other_skip_pinned_tabs() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(route("/b"));
    let c = ctx.open(route("/c"));
    ctx.open(route("/d"));
    ctx.open(pinned("/home", 0));

    ctx.store.close_left_tabs(&c);
    assert_eq!(ctx.keys(), keys(&["/home", "/c", "/d"]));

    ctx.store.close_right_tabs(&c);
    assert_eq!(ctx.keys(), keys(&["/home", "/c"]));

    ctx.open(route("/e"));
    let e = ctx.store.get_tab_by_key("/e").unwrap();
    ctx.store.close_other_tabs(&e);
    assert_eq!(ctx.keys(), keys(&["/home", "/e"]));
}

// =========================================================
// 固定与排序
// =========================================================

#[test]
fn pin_moves_to_end_of_pinned_group_and_keeps_title() {
    let ctx = TestContext::new();
    ctx.open(pinned("/home", 0));
    ctx.open(route("/a"));
    let mut b_route = route("/b");
    b_route.meta.title = Some("B".into());
    ctx.open(b_route);

    let mut b = ctx.store.get_tab_by_key("/b").unwrap();
    b.meta.title = Some("Changed elsewhere".into());
    ctx.store.pin_tab(&b);

    assert_eq!(ctx.raw_keys(), keys(&["/home", "/b", "/a"]));
    let stored = ctx.store.get_tab_by_key("/b").unwrap();
    assert!(stored.is_affix());
    assert_eq!(stored.meta.title.as_deref(), Some("B"));
    assert_eq!(ctx.store.drag_end_index(), 1);
}

#[test]
fn unpin_moves_to_start_of_unpinned_group() {
    let ctx = TestContext::new();
    ctx.open(pinned("/home", 0));
    ctx.open(pinned("/work", 0));
    ctx.open(route("/a"));

    let home = ctx.store.get_tab_by_key("/home").unwrap();
    ctx.store.toggle_tab_pin(&home);

    assert_eq!(ctx.raw_keys(), keys(&["/work", "/home", "/a"]));
    assert_eq!(ctx.keys(), keys(&["/work", "/home", "/a"]));
    assert!(!ctx.store.get_tab_by_key("/home").unwrap().is_affix());

    let home = ctx.store.get_tab_by_key("/home").unwrap();
    ctx.store.toggle_tab_pin(&home);
    assert!(ctx.store.get_tab_by_key("/home").unwrap().is_affix());
    assert_eq!(ctx.store.drag_end_index(), 2);
}

#[test]
fn sort_tabs_splices_and_counts() {
    let ctx = TestContext::new();
    ctx.open(route("/a"));
    ctx.open(route("/b"));
    ctx.open(route("/c"));

    ctx.store.sort_tabs(0, 2);
    assert_eq!(ctx.raw_keys(), keys(&["/b", "/c", "/a"]));
    assert_eq!(ctx.store.drag_end_index(), 1);

    ctx.store.sort_tabs(9, 0);
    assert_eq!(ctx.raw_keys(), keys(&["/b", "/c", "/a"]));
    assert_eq!(ctx.store.drag_end_index(), 1);
}

// =========================================================
// 刷新
// =========================================================

#[tokio::test]
async fn refreshing_current_route_unmounts_view_during_delay() {
    let delay = Rc::new(SnapshotDelay::default());
    let ctx = TestContext::with_delay(delay.clone());
    *delay.store.borrow_mut() = Rc::downgrade(&ctx.store);
    ctx.open(keep_alive("/a"));
    ctx.events.borrow_mut().clear();

    ctx.store.refresh(RefreshTarget::Current(keep_alive("/a"))).await;

    assert_eq!(*delay.seen.borrow(), vec![(false, keys(&["a"]), Vec::new())]);
    assert!(ctx.store.render_route_view());
    assert!(ctx.store.exclude_cached_tabs().is_empty());
    assert_eq!(ctx.store.cached_tabs(), keys(&["a"]));
    assert_eq!(ctx.notifier.notices(), vec![Notice::Start, Notice::Finish]);
    assert_eq!(
        *ctx.events.borrow(),
        vec![
            TabbarEvent::CacheChanged,
            TabbarEvent::RenderRouteViewChanged(false),
            TabbarEvent::CacheChanged,
            TabbarEvent::RenderRouteViewChanged(true),
        ]
    );
}

#[tokio::test]
async fn refreshing_by_name_only_touches_the_exclude_set() {
    let delay = Rc::new(SnapshotDelay::default());
    let ctx = TestContext::with_delay(delay.clone());
    *delay.store.borrow_mut() = Rc::downgrade(&ctx.store);
    ctx.open(keep_alive("/a"));
    ctx.open(keep_alive("/b"));

    ctx.store.refresh(RefreshTarget::Name("b".into())).await;

    assert_eq!(*delay.seen.borrow(), vec![(true, keys(&["b"]), keys(&["a"]))]);
    assert!(ctx.store.exclude_cached_tabs().is_empty());
    assert!(ctx.notifier.notices().is_empty());
}

#[tokio::test]
async fn refresh_waits_for_the_configured_delay() {
    let delay = Rc::new(InstantDelay::new());
    let ctx = TestContext::with_delay(delay.clone());
    ctx.store.refresh(RefreshTarget::Name("x".into())).await;
    assert_eq!(delay.slept(), vec![Duration::from_millis(200)]);
}

// =========================================================
// 其他
// =========================================================

#[test]
fn titles_can_be_set_and_reset() {
    let ctx = TestContext::new();
    let mut a_route = route("/a");
    a_route.meta.title = Some("Alpha".into());
    let a = ctx.open(a_route);

    ctx.store.set_tab_title(&a, "Renamed");
    assert_eq!(ctx.store.get_tab_by_key("/a").unwrap().title(), "Renamed");

    ctx.store.reset_tab_title(&a);
    assert_eq!(ctx.store.get_tab_by_key("/a").unwrap().title(), "Alpha");
}

#[test]
fn menu_list_defaults_to_all_actions() {
    let ctx = TestContext::new();
    assert_eq!(ctx.store.menu_list().len(), 9);
    assert_eq!(
        serde_json::to_string(&TabMenuAction::OpenInNewWindow).unwrap(),
        "\"open-in-new-window\""
    );

    ctx.store
        .set_menu_list(vec![TabMenuAction::Close, TabMenuAction::Reload]);
    assert_eq!(
        ctx.store.menu_list(),
        vec![TabMenuAction::Close, TabMenuAction::Reload]
    );
    assert!(ctx.events.borrow().contains(&TabbarEvent::MenuListChanged));
}

#[test]
fn update_time_is_broadcast() {
    let ctx = TestContext::new();
    ctx.store.set_update_time(1_700_000_000_000);
    assert_eq!(ctx.store.update_time(), 1_700_000_000_000);
    assert_eq!(
        ctx.events.borrow().last(),
        Some(&TabbarEvent::UpdateTimeChanged(1_700_000_000_000))
    );
}

#[test]
fn opens_full_path_in_new_window() {
    let ctx = TestContext::new();
    let tab = ctx.open(route("/report?month=3"));
    let opener = RecordingOpener::default();
    ctx.store.open_tab_in_new_window(&tab, &opener);
    assert_eq!(*opener.opened.borrow(), keys(&["/report?month=3"]));
}

#[test]
fn unsubscribed_listeners_stop_receiving_events() {
    let ctx = TestContext::new();
    let count = Rc::new(Cell::new(0));
    let subscription = {
        let count = count.clone();
        ctx.store.subscribe(move |_| count.set(count.get() + 1))
    };
    ctx.open(route("/a"));
    let after_first = count.get();
    assert!(after_first > 0);

    assert!(ctx.store.unsubscribe(subscription));
    ctx.open(route("/b"));
    assert_eq!(count.get(), after_first);
}
