/*
 * Created on Sat Mar 18 2023
 *
 * This file is a part of Stratus
 * Stratus is a free and open-source in-memory datastore written by
 * Sayan Nandan ("the Author") with the vision to provide speed and
 * reliability in volatile data handling without compromising on
 * consistency or simplicity.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use super::{
    list::{SegList, SEGMENT_CAP},
    stream::{allocate_id, RequestedId, StreamId, StreamIdError},
    zset::SortedSet,
    Corestore, Data, IncrError, WrongType,
};
use std::time::{Duration, Instant};

fn d(bytes: &'static [u8]) -> Data {
    Data::from_static(bytes)
}

#[test]
fn set_get_round_trip() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store.set(d(b"foo"), d(b"bar"), None);
    assert_eq!(store.get(b"foo", now).unwrap().unwrap().as_ref(), b"bar");
    assert_eq!(store.get(b"missing", now).unwrap(), None);
    assert_eq!(store.type_of(b"foo", now), Some("string"));
}

#[test]
fn get_on_list_is_wrongtype() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store.list_push(b"q", vec![d(b"x")], false, now).unwrap();
    assert_eq!(store.get(b"q", now), Err(WrongType));
    // the list is untouched by the failed access
    assert_eq!(store.list_len(b"q", now).unwrap(), 1);
}

#[test]
fn expiry_is_lazy_and_journaled() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store.set(d(b"tmp"), d(b"v"), Some(now + Duration::from_millis(50)));
    assert!(store.exists(b"tmp", now));
    let later = now + Duration::from_millis(51);
    assert!(!store.exists(b"tmp", later));
    assert_eq!(store.drain_expired(), vec![d(b"tmp")]);
    // draining again yields nothing
    assert!(store.drain_expired().is_empty());
}

#[test]
fn overwrite_clears_expiry() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store.set(d(b"k"), d(b"v1"), Some(now + Duration::from_millis(10)));
    store.set(d(b"k"), d(b"v2"), None);
    let later = now + Duration::from_secs(5);
    assert_eq!(store.get(b"k", later).unwrap().unwrap().as_ref(), b"v2");
}

#[test]
fn sweep_respects_batch_limit() {
    let mut store = Corestore::new();
    let now = Instant::now();
    for i in 0..10u8 {
        store.set(
            Data::from(vec![b'k', i]),
            d(b"v"),
            Some(now + Duration::from_millis(1)),
        );
    }
    let later = now + Duration::from_millis(5);
    let first = store.sweep(later, 4);
    assert_eq!(first.len(), 4);
    let rest = store.sweep(later, 100);
    assert_eq!(rest.len(), 6);
    assert_eq!(store.len(later), 0);
}

#[test]
fn incr_decr_semantics() {
    let mut store = Corestore::new();
    let now = Instant::now();
    // missing key counts from zero
    assert_eq!(store.incr_by(b"ctr", 1, now).unwrap(), 1);
    assert_eq!(store.incr_by(b"ctr", -3, now).unwrap(), -2);
    assert_eq!(store.get(b"ctr", now).unwrap().unwrap().as_ref(), b"-2");
    // surrounding whitespace is tolerated
    store.set(d(b"ws"), d(b"  42 "), None);
    assert_eq!(store.incr_by(b"ws", 1, now).unwrap(), 43);
    // non-integer text
    store.set(d(b"txt"), d(b"ten"), None);
    assert_eq!(store.incr_by(b"txt", 1, now), Err(IncrError::NotAnInteger));
    // overflow
    store.set(d(b"max"), Data::from(i64::MAX.to_string().into_bytes()), None);
    assert_eq!(store.incr_by(b"max", 1, now), Err(IncrError::Overflow));
    assert_eq!(
        store.get(b"max", now).unwrap().unwrap().as_ref(),
        i64::MAX.to_string().as_bytes()
    );
}

#[test]
fn list_push_pop_round_trip() {
    let mut store = Corestore::new();
    let now = Instant::now();
    assert_eq!(
        store
            .list_push(b"q", vec![d(b"a"), d(b"b")], false, now)
            .unwrap(),
        2
    );
    assert_eq!(
        store.list_pop(b"q", true, now).unwrap().unwrap().as_ref(),
        b"a"
    );
    assert_eq!(
        store.list_pop(b"q", true, now).unwrap().unwrap().as_ref(),
        b"b"
    );
    // an emptied list releases its key
    assert!(!store.exists(b"q", now));
    assert_eq!(store.list_pop(b"q", true, now).unwrap(), None);
}

#[test]
fn list_range_negative_indices() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store
        .list_push(b"l", vec![d(b"a"), d(b"b"), d(b"c")], false, now)
        .unwrap();
    let all = store.list_range(b"l", 0, -1, now).unwrap();
    assert_eq!(all, vec![d(b"a"), d(b"b"), d(b"c")]);
    let tail = store.list_range(b"l", -2, -1, now).unwrap();
    assert_eq!(tail, vec![d(b"b"), d(b"c")]);
    assert!(store.list_range(b"l", 5, 10, now).unwrap().is_empty());
}

#[test]
fn seglist_matches_a_plain_deque_under_random_ops() {
    use rand::Rng;
    use std::collections::VecDeque;
    let mut rng = rand::thread_rng();
    let mut list = SegList::new();
    let mut model: VecDeque<Data> = VecDeque::new();
    for i in 0..4096u32 {
        match rng.gen_range(0..4u8) {
            0 => {
                let value = Data::from(format!("f{i}").into_bytes());
                list.push_front(value.clone());
                model.push_front(value);
            }
            1 => {
                let value = Data::from(format!("b{i}").into_bytes());
                list.push_back(value.clone());
                model.push_back(value);
            }
            2 => assert_eq!(list.pop_front(), model.pop_front()),
            _ => assert_eq!(list.pop_back(), model.pop_back()),
        }
        assert_eq!(list.len(), model.len());
    }
    let drained: Vec<Data> = std::iter::from_fn(|| list.pop_front()).collect();
    let expected: Vec<Data> = model.into_iter().collect();
    assert_eq!(drained, expected);
}

#[test]
fn seglist_spans_segments() {
    let mut list = SegList::new();
    let total = SEGMENT_CAP * 3 + 7;
    for i in 0..total {
        list.push_back(Data::from(i.to_string().into_bytes()));
    }
    assert_eq!(list.len(), total);
    // pushing at the head chains a fresh segment
    list.push_front(d(b"head"));
    assert_eq!(list.range(0, 0), vec![d(b"head")]);
    assert_eq!(list.pop_front().unwrap(), d(b"head"));
    for i in 0..total {
        assert_eq!(list.pop_front().unwrap().as_ref(), i.to_string().as_bytes());
    }
    assert!(list.is_empty());
    assert_eq!(list.pop_back(), None);
}

#[test]
fn zset_add_and_rank() {
    let mut zset = SortedSet::new();
    assert!(zset.insert(100.0, d(b"alice")));
    assert!(zset.insert(200.0, d(b"bob")));
    assert!(zset.insert(150.0, d(b"charlie")));
    // re-adding the same member is an update, not an insert
    assert!(!zset.insert(120.0, d(b"alice")));
    assert_eq!(zset.len(), 3);
    assert_eq!(zset.score(b"alice"), Some(120.0));
    assert_eq!(zset.rank(b"alice"), Some(0));
    assert_eq!(zset.rank(b"charlie"), Some(1));
    assert_eq!(zset.rank(b"bob"), Some(2));
    assert_eq!(zset.rank(b"nobody"), None);
}

#[test]
fn zset_score_ties_order_by_member() {
    let mut zset = SortedSet::new();
    zset.insert(1.0, d(b"bb"));
    zset.insert(1.0, d(b"aa"));
    zset.insert(1.0, d(b"cc"));
    let members: Vec<_> = zset.range(0, -1).into_iter().map(|(m, _)| m).collect();
    assert_eq!(members, vec![d(b"aa"), d(b"bb"), d(b"cc")]);
}

#[test]
fn zset_removal_releases_key() {
    let mut store = Corestore::new();
    let now = Instant::now();
    store
        .zset_add(b"z", vec![(1.0, d(b"m"))], now)
        .unwrap();
    assert_eq!(store.zset_remove(b"z", &[d(b"m")], now).unwrap(), 1);
    assert!(!store.exists(b"z", now));
}

#[test]
fn stream_id_allocator_auto() {
    // clock ahead of the stream top
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Auto, 9),
        Ok(StreamId::new(9, 0))
    );
    // clock at the stream top: bump the sequence
    assert_eq!(
        allocate_id(StreamId::new(9, 0), &RequestedId::Auto, 9),
        Ok(StreamId::new(9, 1))
    );
    // clock behind the stream top: never go backwards
    assert_eq!(
        allocate_id(StreamId::new(9, 1), &RequestedId::Auto, 7),
        Ok(StreamId::new(9, 2))
    );
    // empty stream
    assert_eq!(
        allocate_id(StreamId::ZERO, &RequestedId::Auto, 1234),
        Ok(StreamId::new(1234, 0))
    );
}

#[test]
fn stream_id_allocator_partial() {
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Partial(5), 0),
        Ok(StreamId::new(5, 4))
    );
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Partial(8), 0),
        Ok(StreamId::new(8, 0))
    );
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Partial(4), 0),
        Err(StreamIdError::IdTooSmall)
    );
    // 0-* on an empty stream starts at sequence 1
    assert_eq!(
        allocate_id(StreamId::ZERO, &RequestedId::Partial(0), 0),
        Ok(StreamId::new(0, 1))
    );
}

#[test]
fn stream_id_allocator_explicit() {
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Explicit(StreamId::new(6, 0)), 0),
        Ok(StreamId::new(6, 0))
    );
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Explicit(StreamId::new(5, 3)), 0),
        Err(StreamIdError::IdExists)
    );
    assert_eq!(
        allocate_id(StreamId::new(5, 3), &RequestedId::Explicit(StreamId::new(5, 2)), 0),
        Err(StreamIdError::IdTooSmall)
    );
    assert_eq!(
        allocate_id(StreamId::ZERO, &RequestedId::Explicit(StreamId::ZERO), 0),
        Err(StreamIdError::IdIsZero)
    );
}

#[test]
fn stream_requested_id_parsing() {
    assert_eq!(RequestedId::parse(b"*"), Ok(RequestedId::Auto));
    assert_eq!(RequestedId::parse(b"7-*"), Ok(RequestedId::Partial(7)));
    assert_eq!(
        RequestedId::parse(b"7-2"),
        Ok(RequestedId::Explicit(StreamId::new(7, 2)))
    );
    assert_eq!(
        RequestedId::parse(b"7"),
        Ok(RequestedId::Explicit(StreamId::new(7, 0)))
    );
    assert_eq!(RequestedId::parse(b"abc"), Err(StreamIdError::IdSyntax));
    assert_eq!(RequestedId::parse(b"1-x"), Err(StreamIdError::IdSyntax));
}

#[test]
fn stream_add_and_ranges() {
    let mut store = Corestore::new();
    let now = Instant::now();
    let id1 = store
        .stream_add(b"s", &RequestedId::Auto, vec![(d(b"a"), d(b"1"))], 100, now)
        .unwrap();
    let id2 = store
        .stream_add(b"s", &RequestedId::Auto, vec![(d(b"a"), d(b"2"))], 100, now)
        .unwrap();
    assert!(id2 > id1);
    let all = store
        .stream_range(b"s", StreamId::ZERO, StreamId::MAX, None, now)
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, id1);
    assert_eq!(all[1].0, id2);
    // COUNT caps the result
    let capped = store
        .stream_range(b"s", StreamId::ZERO, StreamId::MAX, Some(1), now)
        .unwrap();
    assert_eq!(capped.len(), 1);
    // strictly-after semantics
    let after = store.stream_get_after(b"s", id1, -1, now).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].0, id2);
    assert!(store.stream_get_after(b"s", id2, -1, now).unwrap().is_empty());
}
