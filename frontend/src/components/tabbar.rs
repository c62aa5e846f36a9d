use crate::components::context::use_console;
use crate::tabbar::{Tab, tab_key_of};
use crate::web::BrowserWindow;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tracing::warn;

#[component]
pub fn TabBar() -> impl IntoView {
    let ctx = use_console();
    let active_key = move || tab_key_of(&ctx.route.get());

    let on_refresh = move |_| {
        let shell = ctx.shell();
        spawn_local(async move { shell.refresh_current().await });
    };

    view! {
        <div class="flex items-center gap-1 px-2 py-1 bg-base-100 border-b border-base-300 overflow-x-auto">
            <For
                each=move || ctx.tabs.get()
                key=|tab| (tab.key.clone(), tab.title().to_string(), tab.is_affix())
                children=move |tab: Tab| {
                    let key = tab.key.clone();
                    let is_active = move || active_key() == key;
                    view! { <TabItem tab=tab is_active=Signal::derive(is_active) /> }
                }
            />
            <div class="flex-1"></div>
            <button class="btn btn-ghost btn-xs" title="Reload" on:click=on_refresh>"↻"</button>
        </div>
    }
}

#[component]
fn TabItem(tab: Tab, is_active: Signal<bool>) -> impl IntoView {
    let ctx = use_console();
    let tab = StoredValue::new(tab);
    let is_affix = tab.with_value(Tab::is_affix);
    let title = tab.with_value(|t| t.title().to_string());

    let on_select = move |_| {
        let shell = ctx.shell();
        let target = tab.with_value(Tab::target);
        spawn_local(async move {
            if let Err(e) = shell.navigate(target).await {
                warn!(error = %e, "failed to switch tab");
            }
        });
    };

    let on_close = move |ev: leptos::web_sys::MouseEvent| {
        ev.stop_propagation();
        let shell = ctx.shell();
        let tab = tab.get_value();
        spawn_local(async move {
            if let Err(e) = shell.close_tab(&tab).await {
                warn!(error = %e, "failed to close tab");
            }
        });
    };

    let on_pin = move |ev: leptos::web_sys::MouseEvent| {
        ev.stop_propagation();
        tab.with_value(|t| ctx.shell().tabbar().toggle_tab_pin(t));
    };

    let on_open = move |ev: leptos::web_sys::MouseEvent| {
        ev.stop_propagation();
        tab.with_value(|t| ctx.shell().tabbar().open_tab_in_new_window(t, &BrowserWindow));
    };

    view! {
        <div
            class=move || {
                if is_active.get() {
                    "flex items-center gap-1 px-3 py-1 rounded-md cursor-pointer text-sm whitespace-nowrap bg-primary text-primary-content"
                } else {
                    "flex items-center gap-1 px-3 py-1 rounded-md cursor-pointer text-sm whitespace-nowrap hover:bg-base-200"
                }
            }
            on:click=on_select
        >
            <span>{title}</span>
            <button class="btn btn-ghost btn-xs px-1" title="Pin" on:click=on_pin>
                {if is_affix { "📌" } else { "·" }}
            </button>
            <button class="btn btn-ghost btn-xs px-1" title="Open in new window" on:click=on_open>"⧉"</button>
            <Show when=move || !is_affix>
                <button class="btn btn-ghost btn-xs px-1" title="Close" on:click=on_close>"✕"</button>
            </Show>
        </div>
    }
}
