use greatcold_common::{BlockAccess, BlockPos, Material};
use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Slots in the rendered fuel bar.
pub const FUEL_BAR_SLOTS: usize = 10;

/// Why a feed request consumed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeedRejected {
    #[error("heater is full")]
    Full,
    #[error("nothing to feed: count and unit must both be positive")]
    NoUnits,
    #[error("one unit does not fit and partial top-up is not allowed")]
    UnitTooLarge,
    #[error("no heater at that position")]
    NoHeater,
}

/// Placeable heater kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    /// Burns anywhere.
    SmallHeater,
    /// Only burns effectively with liquid water directly above it.
    SeaHeater,
}

/// Static properties of a heater kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterProfile {
    pub radius: i32,
    pub max_fuel_ms: u64,
    pub lit: Material,
    pub inert: Material,
    /// Visited-node cap for the melt flood-fill.
    pub melt_node_cap: usize,
    /// Item fuel value is divided by this.
    pub fuel_divisor: u64,
}

impl FuelKind {
    pub const ALL: [FuelKind; 2] = [FuelKind::SmallHeater, FuelKind::SeaHeater];

    pub fn profile(self) -> HeaterProfile {
        match self {
            FuelKind::SmallHeater => HeaterProfile {
                radius: 15,
                max_fuel_ms: 15 * HOUR_MS,
                lit: Material::Shroomlight,
                inert: Material::CoalBlock,
                melt_node_cap: 8_000,
                fuel_divisor: 1,
            },
            FuelKind::SeaHeater => HeaterProfile {
                radius: 24,
                max_fuel_ms: 6 * HOUR_MS,
                lit: Material::SeaLantern,
                inert: Material::DarkPrismarine,
                melt_node_cap: 20_000,
                fuel_divisor: 2,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FuelKind::SmallHeater => "small_heater",
            FuelKind::SeaHeater => "sea_heater",
        }
    }

    /// Whether `material` is one this kind's block can legitimately be.
    pub fn owns_material(self, material: Material) -> bool {
        let p = self.profile();
        material == p.lit || material == p.inert
    }
}

impl std::str::FromStr for FuelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FuelKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown heater kind: {s}"))
    }
}

/// Decides whether an active heater actually burns in its surroundings.
pub trait ActivityGate {
    fn effective_active(&self, source: &FuelHeatSource, host: &impl BlockAccess) -> bool;
}

impl ActivityGate for FuelKind {
    fn effective_active(&self, source: &FuelHeatSource, host: &impl BlockAccess) -> bool {
        match self {
            FuelKind::SmallHeater => source.is_active(),
            FuelKind::SeaHeater => source.is_active() && host.is_water(source.pos.up()),
        }
    }
}

/// Burnable items and their value in minutes of heater fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelItem {
    CoalBlock,
    Coal,
    Charcoal,
    /// Logs, wood and their stripped forms.
    Log,
    CraftingTable,
    WoodenDoor,
    Sign,
    Planks,
    WoodenSlab,
    Stick,
}

impl FuelItem {
    pub fn minutes(self) -> u64 {
        match self {
            FuelItem::CoalBlock => 81,
            FuelItem::Coal | FuelItem::Charcoal | FuelItem::Log => 9,
            FuelItem::CraftingTable => 8,
            FuelItem::WoodenDoor => 6,
            FuelItem::Sign => 4,
            FuelItem::Planks => 2,
            FuelItem::WoodenSlab | FuelItem::Stick => 1,
        }
    }

    /// Fuel one item adds to a heater of `kind`.
    pub fn unit_ms(self, kind: FuelKind) -> u64 {
        self.minutes() * MINUTE_MS / kind.profile().fuel_divisor
    }
}

/// A placed heater burning fuel over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelHeatSource {
    pub kind: FuelKind,
    pub pos: BlockPos,
    pub radius: i32,
    fuel_ms: u64,
    max_fuel_ms: u64,
}

impl FuelHeatSource {
    /// New heater with no fuel.
    pub fn new(kind: FuelKind, pos: BlockPos) -> Self {
        let profile = kind.profile();
        Self {
            kind,
            pos,
            radius: profile.radius,
            fuel_ms: 0,
            max_fuel_ms: profile.max_fuel_ms,
        }
    }

    /// Restore a heater with a stored fuel level, clamped to capacity.
    pub fn with_fuel(kind: FuelKind, pos: BlockPos, fuel_ms: u64) -> Self {
        let mut s = Self::new(kind, pos);
        s.fuel_ms = fuel_ms.min(s.max_fuel_ms);
        s
    }

    pub fn fuel_ms(&self) -> u64 {
        self.fuel_ms
    }

    pub fn max_fuel_ms(&self) -> u64 {
        self.max_fuel_ms
    }

    pub fn is_active(&self) -> bool {
        self.fuel_ms > 0
    }

    pub fn is_effectively_active(&self, host: &impl BlockAccess) -> bool {
        self.kind.effective_active(self, host)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.pos.chebyshev(pos) <= self.radius
    }

    /// Material the heater's block should show right now.
    pub fn display_material(&self, host: &impl BlockAccess) -> Material {
        let p = self.kind.profile();
        if self.is_effectively_active(host) { p.lit } else { p.inert }
    }

    /// Burn `elapsed_ms` of fuel. Returns true when `active` flipped.
    pub fn decay(&mut self, elapsed_ms: u64) -> bool {
        let before = self.is_active();
        self.fuel_ms = self.fuel_ms.saturating_sub(elapsed_ms);
        before != self.is_active()
    }

    /// Add `count` units of `unit_ms` each, never past capacity.
    ///
    /// Only whole units are accepted. When not even one unit fits, a single
    /// unit may top the heater up to full if `allow_partial` is set. Returns the
    /// number of units consumed.
    pub fn feed(
        &mut self,
        unit_ms: u64,
        count: u32,
        allow_partial: bool,
    ) -> Result<u32, FeedRejected> {
        if count == 0 || unit_ms == 0 {
            return Err(FeedRejected::NoUnits);
        }
        let space_left = self.max_fuel_ms.saturating_sub(self.fuel_ms);
        if space_left == 0 {
            return Err(FeedRejected::Full);
        }
        let fit = space_left / unit_ms;
        if fit == 0 {
            if !allow_partial {
                return Err(FeedRejected::UnitTooLarge);
            }
            self.fuel_ms = self.max_fuel_ms;
            return Ok(1);
        }
        let consumed = u64::from(count).min(fit);
        self.fuel_ms += unit_ms * consumed;
        Ok(consumed as u32)
    }

    /// Feed whole items, topping up with one when none fit.
    pub fn feed_items(&mut self, item: FuelItem, count: u32) -> Result<u32, FeedRejected> {
        self.feed(item.unit_ms(self.kind), count, true)
    }

    /// Fuel level in whole percent, rounded down.
    pub fn fuel_percent(&self) -> u8 {
        if self.max_fuel_ms == 0 {
            return 0;
        }
        (self.fuel_ms * 100 / self.max_fuel_ms) as u8
    }

    /// Ten-slot gauge: `■` full, `▬` an exact half slot, `□` empty.
    /// A remainder above half a slot rounds up.
    pub fn fuel_bar(&self) -> String {
        let pct = usize::from(self.fuel_percent());
        let mut full = pct / 10;
        let rem = pct % 10;
        let half = rem == 5;
        if rem > 5 {
            full += 1;
        }
        let full = full.min(FUEL_BAR_SLOTS);
        let mut bar = "■".repeat(full);
        if half && full < FUEL_BAR_SLOTS {
            bar.push('▬');
        }
        let used = full + usize::from(half && full < FUEL_BAR_SLOTS);
        bar.push_str(&"□".repeat(FUEL_BAR_SLOTS - used));
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::{ChunkPos, Sandbox};

    fn small() -> FuelHeatSource {
        FuelHeatSource::new(FuelKind::SmallHeater, BlockPos::new(0, 64, 0))
    }

    #[test]
    fn new_source_is_inactive() {
        let s = small();
        assert_eq!(s.fuel_ms(), 0);
        assert!(!s.is_active());
        assert_eq!(s.max_fuel_ms(), 54_000_000);
    }

    #[test]
    fn coal_block_gives_81_minutes() {
        let mut s = small();
        assert_eq!(s.feed_items(FuelItem::CoalBlock, 1), Ok(1));
        assert_eq!(s.fuel_ms(), 4_860_000);
    }

    #[test]
    fn feed_saturates_at_capacity() {
        let mut s = small();
        // 15 h holds 11 coal blocks (891 min) but not 12.
        assert_eq!(s.feed(4_860_000, 64, false), Ok(11));
        assert_eq!(s.fuel_ms(), 53_460_000);
        assert!(s.fuel_ms() <= s.max_fuel_ms());
    }

    #[test]
    fn partial_top_up_consumes_exactly_one() {
        let mut s = small();
        s.feed(4_860_000, 11, false).unwrap();
        assert_eq!(s.feed(4_860_000, 5, false), Err(FeedRejected::UnitTooLarge));
        assert_eq!(s.feed(4_860_000, 5, true), Ok(1));
        assert_eq!(s.fuel_ms(), s.max_fuel_ms());
        assert_eq!(s.feed(60_000, 1, true), Err(FeedRejected::Full));
    }

    #[test]
    fn zero_count_or_unit_rejected() {
        let mut s = small();
        assert_eq!(s.feed(60_000, 0, true), Err(FeedRejected::NoUnits));
        assert_eq!(s.feed(0, 3, true), Err(FeedRejected::NoUnits));
        assert_eq!(s.fuel_ms(), 0);
    }

    #[test]
    fn decay_is_monotonic_and_flags_state_change() {
        let mut s = small();
        s.feed(2_500, 1, false).unwrap();
        assert!(!s.decay(1_000));
        assert_eq!(s.fuel_ms(), 1_500);
        assert!(s.decay(1_000));
        assert!(!s.is_active());
        assert!(!s.decay(1_000));
        assert_eq!(s.fuel_ms(), 0);
    }

    #[test]
    fn sea_heater_burns_items_at_half_value() {
        assert_eq!(FuelItem::Coal.unit_ms(FuelKind::SeaHeater), 270_000);
        assert_eq!(FuelItem::Coal.unit_ms(FuelKind::SmallHeater), 540_000);
    }

    #[test]
    fn sea_heater_needs_water_above() {
        let mut sb = Sandbox::default();
        sb.load_chunk(ChunkPos::new(0, 0));
        let mut s = FuelHeatSource::new(FuelKind::SeaHeater, BlockPos::new(1, 40, 1));
        s.feed(60_000, 1, false).unwrap();
        assert!(s.is_active());
        assert!(!s.is_effectively_active(&sb));
        assert_eq!(s.display_material(&sb), Material::DarkPrismarine);
        sb.set_block(BlockPos::new(1, 41, 1), Material::Water);
        assert!(s.is_effectively_active(&sb));
        assert_eq!(s.display_material(&sb), Material::SeaLantern);
    }

    #[test]
    fn fuel_bar_rounding() {
        let pos = BlockPos::new(0, 0, 0);
        let max = FuelKind::SmallHeater.profile().max_fuel_ms;
        let at = |pct: u64| FuelHeatSource::with_fuel(FuelKind::SmallHeater, pos, max * pct / 100);
        assert_eq!(at(0).fuel_bar(), "□□□□□□□□□□");
        assert_eq!(at(45).fuel_bar(), "■■■■▬□□□□□");
        assert_eq!(at(47).fuel_bar(), "■■■■■□□□□□");
        assert_eq!(at(43).fuel_bar(), "■■■■□□□□□□");
        assert_eq!(at(100).fuel_bar(), "■■■■■■■■■■");
        assert_eq!(at(97).fuel_bar().chars().count(), FUEL_BAR_SLOTS);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in FuelKind::ALL {
            assert_eq!(kind.name().parse::<FuelKind>(), Ok(kind));
        }
        assert!("mega_furnace".parse::<FuelKind>().is_err());
    }
}
