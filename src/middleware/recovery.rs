use crate::context::Context;
use crate::handler::Handler;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::error;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Chains a hook in front of the current one that records the backtrace
/// while the panicking frames are still on the stack.
fn install_backtrace_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let _ = PANIC_BACKTRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(Backtrace::force_capture());
                }
            });
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Backtrace {
    PANIC_BACKTRACE
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .unwrap_or_else(Backtrace::force_capture)
}

/// Turns a panic anywhere further down the chain into a 500 response.
///
/// Install it ahead of the handlers it should protect; panics raised before
/// it runs are not caught.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Handler for Recovery {
    fn call(&self, c: &mut Context) {
        install_backtrace_hook();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| c.next())) {
            let message = panic_message(payload.as_ref());
            let backtrace = take_panic_backtrace();
            error!(
                method = %c.method(),
                path = %c.path(),
                panic_message = %message,
                backtrace = %backtrace,
                "handler panicked"
            );
            c.fail(500, "Internal Server Error");
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}
