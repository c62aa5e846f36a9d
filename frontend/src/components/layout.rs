//! 登录后的主布局：侧边菜单、顶栏、标签栏与页面区域

use crate::components::context::use_console;
use crate::components::tabbar::TabBar;
use crate::router::{NavigationTarget, RouteLocation};
use crate::web::Toast;
use adminkit_shared::MenuInfo;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tracing::warn;

#[component]
pub fn ConsoleLayout() -> impl IntoView {
    let ctx = use_console();
    let app_name = ctx.shell().preferences().get().app.name;
    let username = move || {
        ctx.route.track();
        ctx.shell()
            .session()
            .user_info()
            .map(|u| u.nickname.unwrap_or(u.username))
            .unwrap_or_default()
    };

    let on_logout = move |_| {
        let shell = ctx.shell();
        spawn_local(async move {
            if let Err(e) = shell.logout().await {
                warn!(error = %e, "logout failed");
            }
        });
    };

    let on_lock = move |_| {
        // 未设置锁屏密码时，以空密码锁定
        if let Err(e) = ctx.shell().lock().lock_screen("") {
            warn!(error = %e, "failed to lock screen");
        }
    };

    view! {
        <div class="flex min-h-screen bg-base-200">
            <aside class="w-56 bg-base-100 border-r border-base-300">
                <div class="p-4 text-lg font-bold">{app_name}</div>
                <ul class="menu">
                    <For
                        each=move || ctx.menus.get()
                        key=|menu| menu.id
                        children=|menu: MenuInfo| view! { <MenuEntry menu=menu /> }
                    />
                </ul>
            </aside>

            <div class="flex-1 flex flex-col">
                <header class="navbar bg-base-100 border-b border-base-300">
                    <div class="flex-1"></div>
                    <span class="mr-4 text-sm">{username}</span>
                    <button class="btn btn-ghost btn-sm" on:click=on_lock>"Lock"</button>
                    <button class="btn btn-ghost btn-sm" on:click=on_logout>"Logout"</button>
                </header>
                <TabBar />
                <main class="flex-1 p-4">
                    <Show when=move || ctx.render_view.get()>
                        <PageView />
                    </Show>
                </main>
            </div>
            <Show when=move || ctx.locked.get()>
                <LockScreen />
            </Show>
        </div>
    }
}

#[component]
fn MenuEntry(menu: MenuInfo) -> AnyView {
    let ctx = use_console();
    let title = menu.title.clone().unwrap_or_else(|| menu.name.clone());
    let path = menu.path.clone();
    let children = menu.children.clone();

    let on_click = move |_| {
        let shell = ctx.shell();
        let target = NavigationTarget::new(path.clone());
        spawn_local(async move {
            if let Err(e) = shell.navigate(target).await {
                warn!(error = %e, "menu navigation failed");
            }
        });
    };

    view! {
        <li>
            <a on:click=on_click>{title}</a>
            {(!children.is_empty()).then(|| view! {
                <ul>
                    {children
                        .into_iter()
                        .map(|child| view! { <MenuEntry menu=child /> })
                        .collect_view()}
                </ul>
            })}
        </li>
    }
    .into_any()
}

/// 页面区域
///
/// keep-alive 页面只隐藏不卸载；刷新时名称会暂时移出缓存，页面随之重新挂载。
#[component]
fn PageView() -> impl IntoView {
    let ctx = use_console();
    let kept_pages = move || {
        let cached = ctx.cached.get();
        ctx.tabs.with(|tabs| {
            cached
                .into_iter()
                .filter(|name| tabs.iter().any(|tab| &tab.name == name))
                .collect::<Vec<_>>()
        })
    };
    let current_is_kept = move || {
        let name = ctx.route.with(|r| r.name.clone());
        ctx.cached.with(|cached| cached.contains(&name))
    };

    view! {
        <For
            each=kept_pages
            key=|name: &String| name.clone()
            children=move |name: String| {
                let route = ctx.route.get_untracked();
                let hidden = move || ctx.route.with(|r| r.name != name);
                view! {
                    <div class:hidden=hidden>
                        <RoutePage route=route />
                    </div>
                }
            }
        />
        <Show when=move || !current_is_kept()>
            {move || view! { <RoutePage route=ctx.route.get() /> }}
        </Show>
    }
}

#[component]
fn RoutePage(route: RouteLocation) -> AnyView {
    if route.is_not_found() {
        return view! {
            <div class="flex items-center justify-center h-full">
                <div class="text-center">
                    <h1 class="text-6xl font-bold text-error">"404"</h1>
                    <p class="text-xl mt-4">"Page not found"</p>
                </div>
            </div>
        }
        .into_any();
    }
    let title = route.meta.title.clone().unwrap_or(route.name.clone());
    view! {
        <div class="card bg-base-100 shadow">
            <div class="card-body">
                <h2 class="card-title">{title}</h2>
                <p class="text-base-content/70 font-mono text-sm">{route.full_path}</p>
            </div>
        </div>
    }
    .into_any()
}

#[component]
fn LockScreen() -> impl IntoView {
    let ctx = use_console();
    let (password, set_password) = signal(String::new());
    let (rejected, set_rejected) = signal(false);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        match ctx.shell().lock().unlock_screen(&password.get()) {
            Ok(unlocked) => set_rejected.set(!unlocked),
            Err(e) => warn!(error = %e, "failed to unlock screen"),
        }
        set_password.set(String::new());
    };

    view! {
        <div class="fixed inset-0 z-50 flex items-center justify-center bg-base-300/90">
            <form class="card bg-base-100 shadow-xl p-6 w-80" on:submit=on_submit>
                <h2 class="text-lg font-bold mb-4">"Screen locked"</h2>
                <input
                    type="password"
                    class="input input-bordered w-full"
                    class:input-error=move || rejected.get()
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                    prop:value=password
                />
                <button class="btn btn-primary mt-4">"Unlock"</button>
            </form>
        </div>
    }
}

/// 右上角消息与顶部进度条
#[component]
pub fn Notifications() -> impl IntoView {
    let ctx = use_console();
    view! {
        <Show when=move || ctx.loading.get()>
            <progress class="progress progress-primary fixed top-0 left-0 w-full h-1 z-50"></progress>
        </Show>
        <div class="toast toast-top toast-end z-50">
            <For
                each=move || ctx.toasts.get()
                key=|toast| toast.id
                children=|toast: Toast| {
                    let class = if toast.is_error { "alert alert-error" } else { "alert alert-success" };
                    view! { <div class=class><span>{toast.message}</span></div> }
                }
            />
        </div>
    }
}
