use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use dashmap::DashMap;
use fujion_wire::ClientInvocation;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    component::{Component, PropertyValue},
    error::{EventError, MaterializeError},
    registry::PAGE_TAG,
};

pub(crate) const CREATE_FUNCTION: &str = "fujion.widget.create";
pub(crate) const UPDATE_FUNCTION: &str = "fujion.widget.updateProperty";

/// Destination of the invocations a page produces.
pub trait InvocationSink: Send + Sync {
    fn invoke(&self, invocation: ClientInvocation);
}

/// A client event addressed to one component of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    target: String,
    data: Value,
    blob: Option<Bytes>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: target.into(),
            data: Value::Null,
            blob: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_blob(mut self, blob: Bytes) -> Self {
        self.blob = Some(blob);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn blob(&self) -> Option<&Bytes> {
        self.blob.as_ref()
    }
}

pub type EventHandler = Arc<dyn Fn(&Page, &Event) -> Result<(), EventError> + Send + Sync>;

struct PageState {
    components: HashMap<String, Component>,
    browser_info: Map<String, Value>,
    initialized: bool,
    destroyed: bool,
}

/// Live server-side page: the component tree one browser page is bound to.
pub struct Page {
    id: String,
    src: String,
    state: Mutex<PageState>,
    events: Mutex<VecDeque<Event>>,
    sink: RwLock<Option<Arc<dyn InvocationSink>>>,
    handlers: DashMap<String, EventHandler>,
    listeners: DashMap<(String, String), Vec<EventHandler>>,
    next_component: AtomicU64,
    created_at: Instant,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("src", &self.src)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        let id = id.into();
        let mut components = HashMap::new();
        components.insert(id.clone(), Component::new(id.clone(), PAGE_TAG, "Page"));
        Self {
            id,
            src: src.into(),
            state: Mutex::new(PageState {
                components,
                browser_info: Map::new(),
                initialized: false,
                destroyed: false,
            }),
            events: Mutex::new(VecDeque::new()),
            sink: RwLock::new(None),
            handlers: DashMap::new(),
            listeners: DashMap::new(),
            next_component: AtomicU64::new(1),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn bind(&self, sink: Arc<dyn InvocationSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn unbind(&self) {
        self.sink.write().take();
    }

    pub fn is_bound(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn invoke(&self, invocation: ClientInvocation) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.invoke(invocation),
            None => debug!(
                page_id = %self.id,
                function = invocation.function(),
                "page is not bound; dropping invocation"
            ),
        }
    }

    pub fn invoke_on(&self, target: Option<&str>, function: &str, arguments: Vec<Value>) {
        self.invoke(ClientInvocation::new(
            function,
            target.map(str::to_string),
            arguments,
        ));
    }

    /// Value of the page's own `name` property.
    pub fn name(&self) -> Option<String> {
        self.property(&self.id, "name")
            .and_then(|value| value.as_text().map(str::to_string))
    }

    pub fn property(&self, component_id: &str, name: &str) -> Option<PropertyValue> {
        self.state
            .lock()
            .components
            .get(component_id)
            .and_then(|component| component.property(name).cloned())
    }

    /// Updates a property and pushes the change to the client.
    pub fn set_property(
        &self,
        component_id: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), EventError> {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(EventError::PageDestroyed(self.id.clone()));
            }
            let component = state
                .components
                .get_mut(component_id)
                .ok_or_else(|| EventError::UnknownTarget(component_id.to_string()))?;
            component.set_property(name, value.clone());
        }
        self.invoke_on(
            Some(component_id),
            UPDATE_FUNCTION,
            vec![Value::String(name.to_string()), value.to_value()],
        );
        Ok(())
    }

    pub fn component(&self, component_id: &str) -> Option<Component> {
        self.state.lock().components.get(component_id).cloned()
    }

    pub fn children(&self, component_id: &str) -> Vec<String> {
        self.state
            .lock()
            .components
            .get(component_id)
            .map(|component| component.children().to_vec())
            .unwrap_or_default()
    }

    /// Number of components including the page itself.
    pub fn component_count(&self) -> usize {
        self.state.lock().components.len()
    }

    pub fn next_component_id(&self) -> String {
        let sequence = self.next_component.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.id, sequence)
    }

    /// Mutates a component in place without notifying the client.
    pub(crate) fn update_component<R>(
        &self,
        component_id: &str,
        update: impl FnOnce(&mut Component) -> R,
    ) -> Option<R> {
        self.state
            .lock()
            .components
            .get_mut(component_id)
            .map(update)
    }

    /// Inserts a component under `parent_id` and announces it to the client.
    pub(crate) fn attach(
        &self,
        parent_id: &str,
        mut component: Component,
    ) -> Result<(), MaterializeError> {
        let payload = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(MaterializeError::PageDestroyed(self.id.clone()));
            }
            let parent = state
                .components
                .get_mut(parent_id)
                .ok_or_else(|| MaterializeError::UnknownParent(parent_id.to_string()))?;
            parent.push_child(component.id().to_string());
            component.set_parent(Some(parent_id.to_string()));
            let payload = component.create_payload();
            state
                .components
                .insert(component.id().to_string(), component);
            payload
        };
        self.invoke(ClientInvocation::global(
            CREATE_FUNCTION,
            vec![Value::String(parent_id.to_string()), payload],
        ));
        Ok(())
    }

    /// Removes a component and its descendants without notifying the
    /// client. Returns how many components were removed; the page itself is
    /// never removed.
    pub fn discard_component(&self, component_id: &str) -> usize {
        if component_id == self.id {
            return 0;
        }
        let mut state = self.state.lock();
        let Some(root) = state.components.remove(component_id) else {
            return 0;
        };
        if let Some(parent) = root
            .parent()
            .and_then(|parent| state.components.get_mut(parent))
        {
            parent.remove_child(component_id);
        }
        let mut removed = 1;
        let mut pending: Vec<String> = root.children().to_vec();
        while let Some(id) = pending.pop() {
            if let Some(component) = state.components.remove(&id) {
                pending.extend_from_slice(component.children());
                removed += 1;
            }
        }
        removed
    }

    pub fn browser_info(&self) -> Map<String, Value> {
        self.state.lock().browser_info.clone()
    }

    pub fn set_browser_info(&self, info: Map<String, Value>) {
        self.state.lock().browser_info = info;
    }

    pub fn mark_initialized(&self) {
        self.state.lock().initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Registers a handler that components reference by name through
    /// `on:<event>="<name>"`.
    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Page, &Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn add_event_listener<F>(&self, target: &str, event_type: &str, listener: F)
    where
        F: Fn(&Page, &Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.listeners
            .entry((target.to_string(), event_type.to_string()))
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn queue_event(&self, event: Event) {
        self.events.lock().push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear_event_queue(&self) {
        self.events.lock().clear();
    }

    /// Dispatches queued events until the queue is empty, including events
    /// queued by the handlers themselves. Stops at the first failure.
    pub fn process_event_queue(&self) -> Result<usize, EventError> {
        let mut processed = 0;
        loop {
            let next = self.events.lock().pop_front();
            let Some(event) = next else {
                return Ok(processed);
            };
            self.dispatch(&event)?;
            processed += 1;
        }
    }

    fn dispatch(&self, event: &Event) -> Result<(), EventError> {
        let bound = {
            let state = self.state.lock();
            if state.destroyed {
                return Err(EventError::PageDestroyed(self.id.clone()));
            }
            let component = state
                .components
                .get(event.target())
                .ok_or_else(|| EventError::UnknownTarget(event.target().to_string()))?;
            component.event_handler(event.event_type()).map(str::to_string)
        };

        let mut handled = false;
        if let Some(name) = bound {
            let handler = self
                .handlers
                .get(&name)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or(EventError::MissingHandler(name))?;
            handler(self, event)?;
            handled = true;
        }

        let listeners = self
            .listeners
            .get(&(event.target().to_string(), event.event_type().to_string()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        for listener in listeners {
            listener(self, event)?;
            handled = true;
        }

        if !handled {
            debug!(
                page_id = %self.id,
                event_type = event.event_type(),
                target = event.target(),
                "event has no handlers"
            );
        }
        Ok(())
    }

    /// Releases the component tree and disconnects the page from its sink.
    pub fn destroy(&self) {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.components.clear();
        }
        self.clear_event_queue();
        self.handlers.clear();
        self.listeners.clear();
        self.unbind();
        debug!(page_id = %self.id, "page destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }
}

/// Live pages by id.
#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: DashMap<String, Arc<Page>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a page for `src` under a fresh id.
    pub fn create_page(&self, src: impl Into<String>) -> Arc<Page> {
        let page = Arc::new(Page::new(Uuid::new_v4().to_string(), src));
        self.register(Arc::clone(&page));
        page
    }

    pub fn register(&self, page: Arc<Page>) {
        if let Some(previous) = self.pages.insert(page.id().to_string(), page) {
            warn!(page_id = %previous.id(), "replaced an already registered page");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Page>> {
        self.pages.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<Page>> {
        self.pages.remove(id).map(|(_, page)| page)
    }

    /// Destroys and unregisters pages no session has claimed within
    /// `max_age`. Returns how many were removed.
    pub fn reap_unclaimed(&self, max_age: Duration) -> usize {
        let mut reaped = Vec::new();
        self.pages.retain(|_, page| {
            let unclaimed = !page.is_bound() && !page.is_initialized();
            if unclaimed && page.created_at().elapsed() >= max_age {
                reaped.push(Arc::clone(page));
                return false;
            }
            true
        });
        for page in &reaped {
            page.destroy();
            debug!(page_id = %page.id(), src = %page.src(), "reaped unclaimed page");
        }
        reaped.len()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
