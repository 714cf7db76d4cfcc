//! proxy-wasm adapters
//!
//! Each SDK callback becomes a [`LifecycleEvent`] for the shared
//! [`Dispatcher`]. Callbacks not overridden here keep the SDK's no-op
//! defaults.
// Only the wasm entry point constructs these.
#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType};

use crate::host::ProxyWasmHost;
use crate::lifecycle::{Dispatcher, LifecycleEvent, StreamId};

/// Root context for filter lifecycle management
pub(crate) struct RewriteRootContext {
    dispatcher: Rc<RefCell<Dispatcher>>,
}

impl RewriteRootContext {
    pub(crate) fn new() -> Self {
        Self {
            dispatcher: Rc::new(RefCell::new(Dispatcher::new())),
        }
    }
}

impl Context for RewriteRootContext {
    fn on_done(&mut self) -> bool {
        self.dispatcher.borrow_mut().stop();
        true
    }
}

impl RootContext for RewriteRootContext {
    fn on_vm_start(&mut self, _vm_configuration_size: usize) -> bool {
        debug!("Path rewrite VM started");
        true
    }

    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        match self
            .dispatcher
            .borrow_mut()
            .dispatch(LifecycleEvent::ModuleStart, &ProxyWasmHost)
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Refusing to start path rewrite filter: {}", e);
                false
            }
        }
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        let http = RewriteHttpContext {
            context_id,
            dispatcher: Rc::clone(&self.dispatcher),
        };
        // A refused stream still gets a context; its later events are
        // rejected by the dispatcher and the traffic passes untouched.
        http.dispatch(LifecycleEvent::StreamStart(context_id));
        Some(Box::new(http))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context, one per request/response exchange
struct RewriteHttpContext {
    context_id: StreamId,
    dispatcher: Rc<RefCell<Dispatcher>>,
}

impl RewriteHttpContext {
    fn dispatch(&self, event: LifecycleEvent) {
        if let Err(e) = self.dispatcher.borrow_mut().dispatch(event, &ProxyWasmHost) {
            warn!("[context_id={}] {:?} ignored: {}", self.context_id, event, e);
        }
    }
}

impl Context for RewriteHttpContext {
    fn on_done(&mut self) -> bool {
        self.dispatch(LifecycleEvent::StreamEnd(self.context_id));
        true
    }
}

impl HttpContext for RewriteHttpContext {
    fn on_http_request_headers(&mut self, num_headers: usize, end_of_stream: bool) -> Action {
        self.dispatch(LifecycleEvent::RequestHeaders {
            stream: self.context_id,
            num_headers,
            end_of_stream,
        });
        Action::Continue
    }

    fn on_http_response_headers(&mut self, num_headers: usize, end_of_stream: bool) -> Action {
        self.dispatch(LifecycleEvent::ResponseHeaders {
            stream: self.context_id,
            num_headers,
            end_of_stream,
        });
        Action::Continue
    }
}
