//! Quartz Event Tap Hook
//!
//! macOS click hook built on CGEventTap. The tap sits at the HID location,
//! head-inserted and in filtering (non listen-only) mode, so a blocked click
//! is swallowed by returning NULL from the callback before the window server
//! routes it anywhere.
//!
//! # Permissions
//!
//! Requires Accessibility permissions in System Settings > Privacy & Security.

use super::hook::{ClickHook, ClickSink};
use super::suppress::{fail_open, CallbackVeto};
use super::types::{ClickEvent, MouseButton};
use crate::time::timebase::Timebase;
use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
use core_foundation::runloop::kCFRunLoopDefaultMode;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

type CGEventRef = CFTypeRef;
type CGEventTapProxy = *const c_void;
type CGEventMask = u64;

// CGEventTap location
#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code, clippy::enum_variant_names)]
enum CGEventTapLocation {
    HIDEventTap = 0,
    SessionEventTap = 1,
    AnnotatedSessionEventTap = 2,
}

// CGEventTap placement
#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code, clippy::enum_variant_names)]
enum CGEventTapPlacement {
    HeadInsertEventTap = 0,
    TailAppendEventTap = 1,
}

// CGEventTap options
#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code)]
enum CGEventTapOptions {
    DefaultTap = 0,
    ListenOnly = 1,
}

mod cg_constants {
    // CGEventType values
    pub const CG_EVENT_LEFT_MOUSE_DOWN: u32 = 1;
    pub const CG_EVENT_RIGHT_MOUSE_DOWN: u32 = 3;
    pub const CG_EVENT_OTHER_MOUSE_DOWN: u32 = 25;
    pub const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
    pub const CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

    // CGEventField
    pub const CG_MOUSE_EVENT_BUTTON_NUMBER: u32 = 3;
}
use cg_constants::*;

/// How often the tap thread wakes up to check for a stop request
const RUN_LOOP_SLICE_SECS: f64 = 0.25;

/// Only button-down events are clicks for debounce purposes
fn create_event_mask() -> CGEventMask {
    (1 << CG_EVENT_LEFT_MOUSE_DOWN)
        | (1 << CG_EVENT_RIGHT_MOUSE_DOWN)
        | (1 << CG_EVENT_OTHER_MOUSE_DOWN)
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef,
        user_info: *mut c_void,
    ) -> CFTypeRef;

    fn CGEventTapEnable(tap: CFTypeRef, enable: bool);

    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFTypeRef,
        port: CFTypeRef,
        order: i64,
    ) -> CFTypeRef;

    fn CFRunLoopGetCurrent() -> CFTypeRef;
    fn CFRunLoopAddSource(rl: CFTypeRef, source: CFTypeRef, mode: CFTypeRef);
    fn CFRunLoopRunInMode(mode: CFTypeRef, seconds: f64, return_after_source_handled: u8) -> i32;
    fn CFRunLoopStop(rl: CFTypeRef);
}

extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFTypeRef) -> bool;
}

/// State shared between the owning [`EventTap`] and the tap thread.
///
/// Passed to the callback through `user_info`; it outlives the tap because the
/// tap thread holds an `Arc` until the tap has been disabled and released.
struct TapContext {
    sink: Arc<dyn ClickSink>,
    /// Cleared to ask the tap thread to exit
    running: AtomicBool,
    /// Set when the OS disabled the tap behind our back
    lost: AtomicBool,
    /// Current CFRunLoop of the tap thread, for prompt wakeups
    run_loop: AtomicPtr<c_void>,
    click_count: AtomicU64,
}

/// CGEventTap-backed global click hook
pub struct EventTap {
    install_timeout: Duration,
    context: Option<Arc<TapContext>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl EventTap {
    /// Create an uninstalled tap.
    pub fn new(install_timeout: Duration) -> Self {
        Timebase::init();
        Self {
            install_timeout,
            context: None,
            thread_handle: None,
        }
    }

    fn shutdown_thread(&mut self) {
        if let Some(ctx) = &self.context {
            ctx.running.store(false, Ordering::SeqCst);
            let run_loop = ctx.run_loop.load(Ordering::SeqCst);
            if !run_loop.is_null() {
                unsafe {
                    CFRunLoopStop(run_loop as CFTypeRef);
                }
            }
        }

        // Bounded by one run loop slice once the thread is past tap creation
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl ClickHook for EventTap {
    fn install(&mut self, sink: Arc<dyn ClickSink>) -> crate::Result<()> {
        if self.is_installed() {
            return Err(crate::Error::HookInstall("event tap already installed".into()));
        }
        // Clean up a tap the OS disabled earlier
        self.uninstall();

        if !check_accessibility_permissions() {
            request_accessibility_permissions();
            return Err(crate::Error::HookInstall(
                "Accessibility permission required. Enable in System Settings > \
                 Privacy & Security > Accessibility, then relaunch."
                    .into(),
            ));
        }

        let context = Arc::new(TapContext {
            sink,
            running: AtomicBool::new(true),
            lost: AtomicBool::new(false),
            run_loop: AtomicPtr::new(ptr::null_mut()),
            click_count: AtomicU64::new(0),
        });

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_ctx = Arc::clone(&context);

        let handle = thread::Builder::new()
            .name("click-event-tap".into())
            .spawn(move || run_event_tap_loop(thread_ctx, ready_tx))
            .map_err(|e| {
                crate::Error::HookInstall(format!("Failed to spawn event tap thread: {}", e))
            })?;

        self.context = Some(context);
        self.thread_handle = Some(handle);

        match ready_rx.recv_timeout(self.install_timeout) {
            Ok(Ok(())) => {
                info!("Event tap installed");
                Ok(())
            }
            Ok(Err(message)) => {
                self.shutdown_thread();
                self.context = None;
                Err(crate::Error::HookInstall(message))
            }
            Err(_) => {
                self.shutdown_thread();
                self.context = None;
                Err(crate::Error::HookInstall(format!(
                    "event tap not ready within {}ms",
                    self.install_timeout.as_millis()
                )))
            }
        }
    }

    fn uninstall(&mut self) {
        if self.context.is_none() && self.thread_handle.is_none() {
            return;
        }
        self.shutdown_thread();
        if let Some(ctx) = self.context.take() {
            info!(
                "Event tap removed after {} clicks",
                ctx.click_count.load(Ordering::Relaxed)
            );
        }
    }

    fn is_installed(&self) -> bool {
        let thread_alive = self
            .thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        let healthy = self
            .context
            .as_ref()
            .map(|ctx| !ctx.lost.load(Ordering::SeqCst))
            .unwrap_or(false);
        thread_alive && healthy
    }

    fn name(&self) -> &'static str {
        "cg-event-tap"
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// The event tap callback, called for every matching event
extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() {
        return event;
    }
    // Safety: user_info is the TapContext kept alive by the tap thread's Arc
    let context = unsafe { &*(user_info as *const TapContext) };

    if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT
        || event_type == CG_EVENT_TAP_DISABLED_BY_USER_INPUT
    {
        let reason = if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT {
            "event tap disabled by timeout"
        } else {
            "event tap disabled by user input"
        };
        warn!("{}", reason);
        context.lost.store(true, Ordering::SeqCst);
        context.running.store(false, Ordering::SeqCst);
        context.sink.on_hook_lost(reason);
        return event;
    }

    if !context.running.load(Ordering::Relaxed) {
        return event;
    }

    let button_number = unsafe { CGEventGetIntegerValueField(event, CG_MOUSE_EVENT_BUTTON_NUMBER) };
    let button = match click_button(event_type, button_number) {
        Some(b) => b,
        None => return event,
    };
    let click = ClickEvent::now(button);
    context.click_count.fetch_add(1, Ordering::Relaxed);

    let consume = fail_open(|| {
        let mut veto = CallbackVeto::new();
        context.sink.on_click(click, &mut veto);
        veto.is_consumed()
    });

    if consume {
        trace!("Swallowed {} click", button);
        ptr::null()
    } else {
        event
    }
}

/// RAII guard for a CGEventTap handle. Disables and releases the tap on drop.
struct EventTapGuard(CFTypeRef);

impl Drop for EventTapGuard {
    fn drop(&mut self) {
        unsafe {
            CGEventTapEnable(self.0, false);
            CFRelease(self.0);
        }
    }
}

/// RAII guard for a CFRunLoopSource. Releases the source on drop.
struct RunLoopSourceGuard(CFTypeRef);

impl Drop for RunLoopSourceGuard {
    fn drop(&mut self) {
        unsafe {
            CFRelease(self.0);
        }
    }
}

/// Run the event tap loop on the dedicated thread
fn run_event_tap_loop(context: Arc<TapContext>, ready: mpsc::Sender<Result<(), String>>) {
    let user_info = Arc::as_ptr(&context) as *mut c_void;

    let tap = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::HIDEventTap,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::DefaultTap,
            create_event_mask(),
            event_tap_callback,
            user_info,
        )
    };

    if tap.is_null() {
        let _ = ready.send(Err(
            "Failed to create event tap. Ensure accessibility permissions are granted.".into(),
        ));
        return;
    }
    // Declared before the source guard so the tap is disabled last
    let _tap_guard = EventTapGuard(tap);

    let source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
    if source.is_null() {
        let _ = ready.send(Err("Failed to create run loop source".into()));
        return;
    }
    let _source_guard = RunLoopSourceGuard(source);

    let run_loop = unsafe { CFRunLoopGetCurrent() };
    unsafe {
        CFRunLoopAddSource(run_loop, source, kCFRunLoopDefaultMode as CFTypeRef);
        CGEventTapEnable(tap, true);
    }
    context.run_loop.store(run_loop as *mut c_void, Ordering::SeqCst);

    if ready.send(Ok(())).is_err() {
        // Installer gave up waiting
        context.run_loop.store(ptr::null_mut(), Ordering::SeqCst);
        return;
    }
    debug!("Event tap loop running");

    while context.running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoopRunInMode(kCFRunLoopDefaultMode as CFTypeRef, RUN_LOOP_SLICE_SECS, 0);
        }
    }

    context.run_loop.store(ptr::null_mut(), Ordering::SeqCst);
    if context.lost.load(Ordering::SeqCst) {
        error!("Event tap loop ended: tap disabled by the system");
    } else {
        debug!("Event tap loop stopped");
    }
}

/// Map a CGEventType and button number to a clicked button
fn click_button(cg_type: u32, button_number: i64) -> Option<MouseButton> {
    match cg_type {
        CG_EVENT_LEFT_MOUSE_DOWN => Some(MouseButton::Left),
        CG_EVENT_RIGHT_MOUSE_DOWN => Some(MouseButton::Right),
        CG_EVENT_OTHER_MOUSE_DOWN => {
            let n = u8::try_from(button_number).unwrap_or(u8::MAX);
            Some(MouseButton::from_number(n))
        }
        _ => None,
    }
}

/// Check if accessibility permissions are granted
pub fn check_accessibility_permissions() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Request accessibility permissions (shows system dialog)
pub fn request_accessibility_permissions() -> bool {
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::string::CFString;

    let key = CFString::new("AXTrustedCheckOptionPrompt");
    let value = core_foundation::boolean::CFBoolean::true_value();

    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef() as CFTypeRef) }
}
