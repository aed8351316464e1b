// ── Reactive state container ──
//
// Canonical in-memory copy of every collection, the settings singleton and
// the UI filters. Every write goes through a typed setter that stores the
// value first and then notifies each registered observer exactly once.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, NaiveDate};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{trace, warn};

use super::slot::RecordSlot;
use crate::filter::{
    self, ContractFilters, EventFilters, MenuItemCount, TemplateFilters,
};
use crate::model::{
    BusinessDetails, Collection, ConstraintTag, Contract, ContractStatus, Customer, Event,
    MenuItem, Record, RecordId, Service, SymbolPaletteItem, Template,
};
use crate::stream::{CollectionStream, Snapshot};

// ── Keys and notifications ───────────────────────────────────────────

/// Every top-level key of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Collection(Collection),
    BusinessDetails,
    EventFilters,
    ContractFilters,
    TemplateFilters,
}

impl From<Collection> for StateKey {
    fn from(c: Collection) -> Self {
        Self::Collection(c)
    }
}

/// What an observer is told after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// One key was replaced.
    Key(StateKey),
    /// Every collection and the settings were replaced at once.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(StateChange) + Send + Sync>;

static NEXT_CONTAINER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Containers currently running observers on this thread.
    static NOTIFYING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

struct NotifyGuard(u64);

impl NotifyGuard {
    fn enter(container: u64) -> Option<Self> {
        NOTIFYING.with(|n| {
            let mut active = n.borrow_mut();
            if active.contains(&container) {
                None
            } else {
                active.push(container);
                Some(Self(container))
            }
        })
    }
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        NOTIFYING.with(|n| n.borrow_mut().retain(|c| *c != self.0));
    }
}

/// Full replacement value for [`AppState::reset`].
#[derive(Debug, Clone, Default)]
pub struct StateReset {
    pub events: Vec<Event>,
    pub contracts: Vec<Contract>,
    pub templates: Vec<Template>,
    pub customers: Vec<Customer>,
    pub menu_items: Vec<MenuItem>,
    pub services: Vec<Service>,
    pub constraint_tags: Vec<ConstraintTag>,
    pub symbol_palette_items: Vec<SymbolPaletteItem>,
    pub business_details: BusinessDetails,
}

impl StateReset {
    /// Empty collections with the given settings.
    pub fn empty(business_details: BusinessDetails) -> Self {
        Self {
            business_details,
            ..Self::default()
        }
    }
}

// ── AppState ─────────────────────────────────────────────────────────

/// The single shared mutable resource of a session.
///
/// Observers must not write to the container from inside their own
/// callback: such a write is applied but does not notify again.
pub struct AppState {
    container: u64,
    pub(crate) events: RecordSlot<Event>,
    pub(crate) contracts: RecordSlot<Contract>,
    pub(crate) templates: RecordSlot<Template>,
    pub(crate) customers: RecordSlot<Customer>,
    pub(crate) menu_items: RecordSlot<MenuItem>,
    pub(crate) services: RecordSlot<Service>,
    pub(crate) constraint_tags: RecordSlot<ConstraintTag>,
    pub(crate) symbol_palette_items: RecordSlot<SymbolPaletteItem>,
    business_details: watch::Sender<Arc<BusinessDetails>>,
    event_filters: watch::Sender<EventFilters>,
    contract_filters: watch::Sender<ContractFilters>,
    template_filters: watch::Sender<TemplateFilters>,
    observers: DashMap<ObserverId, Observer>,
    next_observer: AtomicU64,
}

/// Records whose collection lives in [`AppState`].
pub trait Stored: Record {
    #[doc(hidden)]
    fn slot(state: &AppState) -> &RecordSlot<Self>;
}

macro_rules! impl_stored {
    ($($ty:ty => $field:ident),+ $(,)?) => {
        $(
            impl Stored for $ty {
                fn slot(state: &AppState) -> &RecordSlot<Self> {
                    &state.$field
                }
            }
        )+
    };
}

impl_stored! {
    Event => events,
    Contract => contracts,
    Template => templates,
    Customer => customers,
    MenuItem => menu_items,
    Service => services,
    ConstraintTag => constraint_tags,
    SymbolPaletteItem => symbol_palette_items,
}

impl AppState {
    pub fn new() -> Self {
        let (business_details, _) = watch::channel(Arc::new(BusinessDetails::default()));
        let (event_filters, _) = watch::channel(EventFilters::default());
        let (contract_filters, _) = watch::channel(ContractFilters::default());
        let (template_filters, _) = watch::channel(TemplateFilters::default());

        Self {
            container: NEXT_CONTAINER.fetch_add(1, Ordering::Relaxed),
            events: RecordSlot::new(),
            contracts: RecordSlot::new(),
            templates: RecordSlot::new(),
            customers: RecordSlot::new(),
            menu_items: RecordSlot::new(),
            services: RecordSlot::new(),
            constraint_tags: RecordSlot::new(),
            symbol_palette_items: RecordSlot::new(),
            business_details,
            event_filters,
            contract_filters,
            template_filters,
            observers: DashMap::new(),
            next_observer: AtomicU64::new(1),
        }
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a callback invoked after every write.
    pub fn on_state_change<F>(&self, f: F) -> ObserverId
    where
        F: Fn(StateChange) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.insert(id, Arc::new(f));
        id
    }

    /// Unregister an observer. Returns `false` if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    fn notify(&self, change: StateChange) {
        let Some(_guard) = NotifyGuard::enter(self.container) else {
            warn!(?change, "state written from inside an observer; not re-notifying");
            return;
        };
        // Collect first so observers may (un)register without deadlocking the map.
        let observers: Vec<Observer> = self.observers.iter().map(|e| Arc::clone(e.value())).collect();
        trace!(?change, observers = observers.len(), "state changed");
        for observer in observers {
            observer(change);
        }
    }

    // ── Generic collection access ────────────────────────────────────

    pub fn records<T: Stored>(&self) -> Snapshot<T> {
        T::slot(self).snapshot()
    }

    pub fn record<T: Stored>(&self, id: &RecordId) -> Option<Arc<T>> {
        T::slot(self).get(id)
    }

    /// Owned copy of a collection, for computing the next value.
    pub fn records_owned<T: Stored>(&self) -> Vec<T> {
        T::slot(self).to_vec()
    }

    /// Replace a collection and notify once.
    pub fn set<T: Stored>(&self, items: Vec<T>) {
        T::slot(self).replace(items);
        self.notify(StateChange::Key(T::COLLECTION.into()));
    }

    pub fn subscribe<T: Stored>(&self) -> CollectionStream<T> {
        T::slot(self).subscribe()
    }

    pub fn count<T: Stored>(&self) -> usize {
        T::slot(self).len()
    }

    // ── Named snapshot accessors ─────────────────────────────────────

    pub fn events(&self) -> Snapshot<Event> {
        self.events.snapshot()
    }

    pub fn contracts(&self) -> Snapshot<Contract> {
        self.contracts.snapshot()
    }

    pub fn templates(&self) -> Snapshot<Template> {
        self.templates.snapshot()
    }

    pub fn customers(&self) -> Snapshot<Customer> {
        self.customers.snapshot()
    }

    pub fn menu_items(&self) -> Snapshot<MenuItem> {
        self.menu_items.snapshot()
    }

    pub fn services(&self) -> Snapshot<Service> {
        self.services.snapshot()
    }

    pub fn constraint_tags(&self) -> Snapshot<ConstraintTag> {
        self.constraint_tags.snapshot()
    }

    pub fn symbol_palette_items(&self) -> Snapshot<SymbolPaletteItem> {
        self.symbol_palette_items.snapshot()
    }

    // ── Settings and filters ─────────────────────────────────────────

    pub fn business_details(&self) -> Arc<BusinessDetails> {
        self.business_details.borrow().clone()
    }

    pub fn set_business_details(&self, details: BusinessDetails) {
        self.business_details.send_replace(Arc::new(details));
        self.notify(StateChange::Key(StateKey::BusinessDetails));
    }

    pub fn subscribe_business_details(&self) -> watch::Receiver<Arc<BusinessDetails>> {
        self.business_details.subscribe()
    }

    pub fn event_filters(&self) -> EventFilters {
        self.event_filters.borrow().clone()
    }

    pub fn set_event_filters(&self, filters: EventFilters) {
        self.event_filters.send_replace(filters);
        self.notify(StateChange::Key(StateKey::EventFilters));
    }

    pub fn contract_filters(&self) -> ContractFilters {
        self.contract_filters.borrow().clone()
    }

    pub fn set_contract_filters(&self, filters: ContractFilters) {
        self.contract_filters.send_replace(filters);
        self.notify(StateChange::Key(StateKey::ContractFilters));
    }

    pub fn template_filters(&self) -> TemplateFilters {
        self.template_filters.borrow().clone()
    }

    pub fn set_template_filters(&self, filters: TemplateFilters) {
        self.template_filters.send_replace(filters);
        self.notify(StateChange::Key(StateKey::TemplateFilters));
    }

    /// Replace every collection and the settings, notifying once.
    pub fn reset(&self, next: StateReset) {
        self.events.replace(next.events);
        self.contracts.replace(next.contracts);
        self.templates.replace(next.templates);
        self.customers.replace(next.customers);
        self.menu_items.replace(next.menu_items);
        self.services.replace(next.services);
        self.constraint_tags.replace(next.constraint_tags);
        self.symbol_palette_items.replace(next.symbol_palette_items);
        self.business_details.send_replace(Arc::new(next.business_details));
        self.notify(StateChange::Reset);
    }

    // ── Selectors ────────────────────────────────────────────────────

    pub fn filtered_events(&self) -> Vec<Arc<Event>> {
        self.filtered_events_on(Local::now().date_naive())
    }

    pub fn filtered_events_on(&self, today: NaiveDate) -> Vec<Arc<Event>> {
        filter::filter_events(&self.events(), &self.event_filters.borrow(), today)
    }

    pub fn filtered_contracts(&self) -> Vec<Arc<Contract>> {
        self.filtered_contracts_on(Local::now().date_naive())
    }

    pub fn filtered_contracts_on(&self, today: NaiveDate) -> Vec<Arc<Contract>> {
        filter::filter_contracts(&self.contracts(), &self.contract_filters.borrow(), today)
    }

    pub fn filtered_templates(&self) -> Vec<Arc<Template>> {
        filter::filter_templates(&self.templates(), &self.template_filters.borrow())
    }

    pub fn contract_status_counts(&self) -> Vec<(ContractStatus, usize)> {
        filter::contract_status_counts(&self.contracts())
    }

    /// Contracted events per month of `year`.
    pub fn event_volume_by_month(&self, year: i32) -> [usize; 12] {
        filter::event_volume_by_month(&self.contracts(), year)
    }

    pub fn top_menu_items(&self, limit: usize) -> Vec<MenuItemCount> {
        filter::top_menu_items(&self.contracts(), limit)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
