//! 路由表与路由位置
//!
//! 路由记录以绝对路径模式注册（`:name` 为参数段，`*` 匹配剩余所有段），
//! `parent` 指向父记录名称，组成从布局根到页面的匹配链。

use adminkit_shared::MenuInfo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::menu::MenuIndex;

/// 未匹配任何路由时使用的记录名称
pub const NOT_FOUND_ROUTE: &str = "not-found";

// =========================================================
// 查询参数
// =========================================================

/// 有序的查询参数，允许重复键
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析查询串（不含 `?`），键值做 URL 解码，解码失败时保留原文
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, value) = part.split_once('=').unwrap_or((part, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();
        Self(pairs)
    }

    /// 第一个同名参数的值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 编码为查询串（不含 `?`）
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

pub fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// =========================================================
// 路由元信息
// =========================================================

/// 路由元信息
///
/// 全部字段可缺省，合并时以“后者有值则覆盖”为准。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMeta {
    pub title: Option<String>,
    /// 用户自定义的标签页标题
    pub new_tab_title: Option<String>,
    pub icon: Option<String>,
    pub order: Option<i32>,
    /// 固定标签页
    pub affix_tab: Option<bool>,
    pub affix_tab_order: Option<i32>,
    /// 同名路由最多打开的标签页数量
    pub max_num_of_open_tab: Option<i32>,
    pub keep_alive: Option<bool>,
    pub hide_in_tab: Option<bool>,
    /// 标签页 key 是否使用完整路径
    pub full_path_key: Option<bool>,
    /// 无需登录即可访问
    pub ignore_access: Option<bool>,
    /// 页面是否已经加载过（由通用守卫写入）
    pub loaded: Option<bool>,
}

impl RouteMeta {
    /// 以 `over` 中有值的字段覆盖自身
    pub fn merged(&self, over: &RouteMeta) -> RouteMeta {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        RouteMeta {
            title: pick(&self.title, &over.title),
            new_tab_title: pick(&self.new_tab_title, &over.new_tab_title),
            icon: pick(&self.icon, &over.icon),
            order: pick(&self.order, &over.order),
            affix_tab: pick(&self.affix_tab, &over.affix_tab),
            affix_tab_order: pick(&self.affix_tab_order, &over.affix_tab_order),
            max_num_of_open_tab: pick(&self.max_num_of_open_tab, &over.max_num_of_open_tab),
            keep_alive: pick(&self.keep_alive, &over.keep_alive),
            hide_in_tab: pick(&self.hide_in_tab, &over.hide_in_tab),
            full_path_key: pick(&self.full_path_key, &over.full_path_key),
            ignore_access: pick(&self.ignore_access, &over.ignore_access),
            loaded: pick(&self.loaded, &over.loaded),
        }
    }

    pub fn is_affix(&self) -> bool {
        self.affix_tab.unwrap_or(false)
    }

    pub fn affix_order(&self) -> i32 {
        self.affix_tab_order.unwrap_or(0)
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive.unwrap_or(false)
    }

    pub fn is_hidden_in_tab(&self) -> bool {
        self.hide_in_tab.unwrap_or(false)
    }

    pub fn uses_full_path_key(&self) -> bool {
        self.full_path_key.unwrap_or(true)
    }

    pub fn ignores_access(&self) -> bool {
        self.ignore_access.unwrap_or(false)
    }

    /// <= 0 表示不限制
    pub fn max_open(&self) -> Option<usize> {
        self.max_num_of_open_tab
            .filter(|max| *max > 0)
            .map(|max| max as usize)
    }
}

impl From<&MenuInfo> for RouteMeta {
    fn from(menu: &MenuInfo) -> Self {
        RouteMeta {
            title: menu.title.clone(),
            icon: menu.icon.clone(),
            order: menu.order,
            affix_tab: menu.affix_tab,
            max_num_of_open_tab: menu.max_num_of_open_tab,
            keep_alive: menu.keep_alive,
            hide_in_tab: menu.hide_in_tab,
            ..Default::default()
        }
    }
}

// =========================================================
// 路由位置
// =========================================================

/// 匹配链上的一环
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRoute {
    pub name: String,
    pub path: String,
    pub meta: RouteMeta,
}

/// 解析后的路由位置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLocation {
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub query: Query,
    pub params: BTreeMap<String, String>,
    /// 从布局根到页面的匹配链
    pub matched: Vec<MatchedRoute>,
    /// 匹配链上的元信息按顺序合并的结果
    pub meta: RouteMeta,
    pub redirect: Option<String>,
}

impl RouteLocation {
    /// 尚未发生任何导航时的初始位置
    pub fn start() -> Self {
        Self {
            path: "/".to_string(),
            full_path: "/".to_string(),
            ..Default::default()
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.name == NOT_FOUND_ROUTE
    }
}

/// 导航目标
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationTarget {
    pub path: String,
    pub query: Query,
    /// 替换当前历史记录而不是新增
    pub replace: bool,
}

impl NavigationTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// 从完整路径（可带查询串与 hash）解析
    pub fn parse(full_path: &str) -> Self {
        let without_hash = full_path.split('#').next().unwrap_or_default();
        let (path, query) = match without_hash.split_once('?') {
            Some((path, query)) => (path, Query::parse(query)),
            None => (without_hash, Query::new()),
        };
        Self {
            path: normalize_path(path),
            query,
            replace: false,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(key, value);
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.to_query_string())
        }
    }
}

impl From<&RouteLocation> for NavigationTarget {
    fn from(location: &RouteLocation) -> Self {
        Self {
            path: location.path.clone(),
            query: location.query.clone(),
            replace: false,
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    if with_slash.len() > 1 {
        with_slash.trim_end_matches('/').to_string()
    } else {
        with_slash
    }
}

// =========================================================
// 路由表
// =========================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRecord {
    pub name: String,
    /// 绝对路径模式
    pub path: String,
    pub meta: RouteMeta,
    /// 父记录名称
    pub parent: Option<String>,
    pub redirect: Option<String>,
}

impl RouteRecord {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    records: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(records: Vec<RouteRecord>) -> Self {
        Self { records }
    }

    pub fn add(&mut self, record: RouteRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[RouteRecord] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&RouteRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// 把完整路径解析为路由位置
    ///
    /// 优先选择静态段最多的记录；都不匹配时退回 `not-found` 记录，
    /// 连它也没有注册时返回 `None`。
    pub fn resolve(&self, full_path: &str) -> Option<RouteLocation> {
        let target = NavigationTarget::parse(full_path);
        let segments = split_segments(&target.path);

        let mut best: Option<(usize, &RouteRecord, BTreeMap<String, String>)> = None;
        for record in &self.records {
            if let Some((score, params)) = match_pattern(&record.path, &segments) {
                if best.as_ref().is_none_or(|(s, _, _)| score > *s) {
                    best = Some((score, record, params));
                }
            }
        }

        let (record, params) = match best {
            Some((_, record, params)) => (record, params),
            None => (self.record(NOT_FOUND_ROUTE)?, BTreeMap::new()),
        };

        let matched: Vec<MatchedRoute> = self
            .chain(record)
            .into_iter()
            .map(|r| MatchedRoute {
                name: r.name.clone(),
                path: r.path.clone(),
                meta: r.meta.clone(),
            })
            .collect();
        let meta = matched
            .iter()
            .fold(RouteMeta::default(), |acc, m| acc.merged(&m.meta));

        Some(RouteLocation {
            name: record.name.clone(),
            full_path: target.full_path(),
            path: target.path,
            query: target.query,
            params,
            matched,
            meta,
            redirect: record.redirect.clone(),
        })
    }

    /// 所有固定标签页对应的路由（不含参数段）
    pub fn affix_routes(&self) -> Vec<RouteLocation> {
        self.records
            .iter()
            .filter(|r| r.meta.is_affix() && !r.path.contains(':') && !r.path.contains('*'))
            .filter_map(|r| self.resolve(&r.path))
            .collect()
    }

    /// 把后端菜单合并进路由记录
    ///
    /// 只处理启用且不是按钮的菜单；菜单的 `redirect` 优先，元信息以菜单为准覆盖。
    pub fn apply_menus(&mut self, menus: &[MenuInfo]) -> usize {
        let index = MenuIndex::new(menus);
        let mut updated = 0;
        for menu in index.preorder().into_iter().filter(|m| m.is_routable()) {
            let menu_meta = RouteMeta::from(menu);
            for record in self.records.iter_mut().filter(|r| r.path == menu.path) {
                if menu.redirect.is_some() {
                    record.redirect = menu.redirect.clone();
                }
                record.meta = record.meta.merged(&menu_meta);
                updated += 1;
            }
        }
        updated
    }

    /// 从根到该记录的父子链
    fn chain<'a>(&'a self, record: &'a RouteRecord) -> Vec<&'a RouteRecord> {
        let mut chain = vec![record];
        let mut seen: HashSet<&str> = HashSet::from([record.name.as_str()]);
        let mut current = record;
        while let Some(parent) = current.parent.as_deref().and_then(|p| self.record(p)) {
            if !seen.insert(parent.name.as_str()) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// 匹配成功时返回（得分, 参数）
fn match_pattern(pattern: &str, segments: &[&str]) -> Option<(usize, BTreeMap<String, String>)> {
    let pattern_segments = split_segments(pattern);
    let mut params = BTreeMap::new();
    let mut score = 0;

    for (i, part) in pattern_segments.iter().enumerate() {
        if *part == "*" {
            params.insert("path".to_string(), decode_component(&segments[i.min(segments.len())..].join("/")));
            return Some((score, params));
        }
        let segment = segments.get(i)?;
        if let Some(name) = part.strip_prefix(':') {
            params.insert(name.to_string(), decode_component(segment));
            score += 1;
        } else if part == segment {
            score += 2;
        } else {
            return None;
        }
    }

    (pattern_segments.len() == segments.len()).then_some((score + 1, params))
}
