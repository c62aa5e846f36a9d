// Use lol_alloc as the global allocator for smaller WASM size
#[cfg(target_arch = "wasm32")]
use lol_alloc::{AssumeSingleThreaded, FreeListAllocator};

#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOCATOR: AssumeSingleThreaded<FreeListAllocator> =
    unsafe { AssumeSingleThreaded::new(FreeListAllocator::new()) };

#[cfg(target_arch = "wasm32")]
pub fn main() {
    use adminkit_frontend::{App, init_logging};

    console_error_panic_hook::set_once();
    init_logging(tracing::Level::INFO);
    leptos::mount::mount_to_body(App);
}

// 控制台只在浏览器中运行
#[cfg(not(target_arch = "wasm32"))]
pub fn main() {}
