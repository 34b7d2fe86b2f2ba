//! Fixed catalogs: bookable venues and borrowable resource items.
//! Neither changes at runtime; everything else refers to these by id.

use chrono::NaiveTime;

use crate::limits::{SLOT_MINUTES, SLOTS_PER_DAY};
use crate::model::Category;

/// General-access venues (workstations, meeting room).
pub const GENERAL_VENUES: &[&str] = &[
    "工位一",
    "工位二",
    "工位三",
    "工位四",
    "備用工位一",
    "備用工位二",
    "備用工位三",
    "101會議室",
];

/// Restricted-access venues.
pub const RESTRICTED_VENUES: &[&str] = &[
    "保密車間一(白門)",
    "保密車間二(灰門)",
    "保密車間三(B3-1)",
    "保密車間三(B3-2)",
];

pub fn is_known_venue(venue: &str) -> bool {
    GENERAL_VENUES.contains(&venue) || RESTRICTED_VENUES.contains(&venue)
}

/// A borrowable item in the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceItem {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
}

pub const RESOURCES: &[ResourceItem] = &[
    // 門鎖類
    ResourceItem { id: "l1", name: "鐵門遙控器", category: Category::Lock },
    ResourceItem { id: "l2", name: "鐵門牆上鑰匙1", category: Category::Lock },
    ResourceItem { id: "l3", name: "鐵門牆上鑰匙2", category: Category::Lock },
    ResourceItem { id: "l4", name: "鐵門牆上鑰匙3", category: Category::Lock },
    ResourceItem { id: "l5", name: "B2倉庫鑰匙", category: Category::Lock },
    // 工具類
    ResourceItem { id: "t1", name: "工具櫃1(保2內)", category: Category::Tool },
    ResourceItem { id: "t2", name: "工具櫃2(工位1旁)", category: Category::Tool },
    ResourceItem { id: "t3", name: "工具櫃3(頂高機旁)", category: Category::Tool },
    ResourceItem { id: "t4", name: "麥克風櫃", category: Category::Tool },
    ResourceItem { id: "t5", name: "頂高塊櫃", category: Category::Tool },
    ResourceItem { id: "t6", name: "紅工具櫃", category: Category::Tool },
    // 設備類
    ResourceItem { id: "e1", name: "電瓶快速充電機 (100976)", category: Category::Equipment },
    ResourceItem { id: "e2", name: "移動電視(101931) & 電視遙控器(在6F)", category: Category::Equipment },
    ResourceItem { id: "e3", name: "電鑽1", category: Category::Equipment },
    ResourceItem { id: "e4", name: "電鑽2", category: Category::Equipment },
    ResourceItem { id: "e5", name: "游標卡尺", category: Category::Equipment },
    ResourceItem { id: "e6", name: "蘋果公務機 (102488)", category: Category::Equipment },
    ResourceItem { id: "e7", name: "安卓公務機 (102502)", category: Category::Equipment },
    ResourceItem { id: "e8", name: "護貝機 (開發驗證部的)", category: Category::Equipment },
    ResourceItem { id: "e9", name: "電子式扭力板手工具 (102338)", category: Category::Equipment },
    ResourceItem { id: "e10", name: "DC電源供應器 (100788)", category: Category::Equipment },
    ResourceItem { id: "e11", name: "DC電源供應器 (100790)", category: Category::Equipment },
    ResourceItem { id: "e12", name: "電源供應器 (102101)", category: Category::Equipment },
    ResourceItem { id: "e13", name: "數位儲存示波器 (102100)", category: Category::Equipment },
    ResourceItem { id: "e14", name: "手持式數位儲存示波器 (102099)", category: Category::Equipment },
    ResourceItem { id: "e15", name: "多通道函數信號產生器 (102098)", category: Category::Equipment },
];

pub fn item(id: &str) -> Option<&'static ResourceItem> {
    RESOURCES.iter().find(|r| r.id == id)
}

pub fn item_category(id: &str) -> Option<Category> {
    item(id).map(|r| r.category)
}

/// The 48 half-hour marks of a day, 00:00 through 23:30.
pub fn time_slots() -> Vec<NaiveTime> {
    (0..SLOTS_PER_DAY as u32)
        .map(|i| {
            NaiveTime::from_hms_opt(i / 2, (i % 2) * SLOT_MINUTES, 0)
                .expect("slot grid within 24h")
        })
        .collect()
}

/// True if `t` sits exactly on the half-hour grid.
pub fn is_slot_aligned(t: NaiveTime) -> bool {
    use chrono::Timelike;
    t.second() == 0 && t.minute() % SLOT_MINUTES == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_groups_disjoint() {
        for v in GENERAL_VENUES {
            assert!(!RESTRICTED_VENUES.contains(v));
        }
        assert!(is_known_venue("工位一"));
        assert!(is_known_venue("保密車間一(白門)"));
        assert!(!is_known_venue("工位五"));
    }

    #[test]
    fn item_lookup() {
        assert_eq!(item("t4").unwrap().category, Category::Tool);
        assert_eq!(item_category("l1"), Some(Category::Lock));
        assert_eq!(item_category("e15"), Some(Category::Equipment));
        assert!(item("zz").is_none());
    }

    #[test]
    fn slot_grid() {
        let slots = time_slots();
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[0], NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(slots[1], NaiveTime::from_hms_opt(0, 30, 0).unwrap());
        assert_eq!(slots[47], NaiveTime::from_hms_opt(23, 30, 0).unwrap());
        assert!(slots.iter().all(|&t| is_slot_aligned(t)));
        assert!(!is_slot_aligned(NaiveTime::from_hms_opt(8, 15, 0).unwrap()));
    }
}
