//! Container classes end to end.

use vmbind::{Callback, DequeBindings, Vm, VecBindings, foreign_type};

#[derive(Clone, Debug, PartialEq)]
struct Item {
    id: f64,
}

foreign_type!(Item);

fn bind_inventory(vm: &Vm) {
    vm.module("inv", |m| {
        m.klass::<Item>("Item")?.ctor(|id: f64| Item { id });
        VecBindings::<Item>::bind(m, "ItemVec")?;
        Ok(())
    })
    .unwrap();
}

#[test]
fn vector_of_foreign_elements() {
    let vm = Vm::new();
    bind_inventory(&vm);
    let vec = vm
        .find("inv", "ItemVec")
        .unwrap()
        .func("new()")
        .unwrap()
        .call(())
        .unwrap();
    let add = Callback::from_any(&vec, "add(_)").unwrap();
    add.call((Item { id: 1.0 },)).unwrap();
    add.call((Item { id: 2.0 },)).unwrap();
    let get = Callback::from_any(&vec, "[_]").unwrap();
    assert_eq!(
        get.call((1.0,)).unwrap().get::<Item>().unwrap(),
        Item { id: 2.0 }
    );
    assert_eq!(
        vec.get::<Vec<Item>>().unwrap(),
        vec![Item { id: 1.0 }, Item { id: 2.0 }]
    );
}

#[test]
fn registered_vector_argument_crosses_as_an_object() {
    let vm = Vm::new();
    vm.module("inv", |m| {
        VecBindings::<f64>::bind(m, "DoubleVec")?;
        let mut k = m.klass::<Item>("Item")?;
        k.ctor(|| Item { id: 0.0 })
            .func_static("sum", |values: Vec<f64>| values.iter().sum::<f64>());
        Ok(())
    })
    .unwrap();
    // Vec<f64> is a registered class here, so the argument rides as a
    // foreign object and pops back out of the cell.
    let class = vm.find("inv", "Item").unwrap();
    let total = class
        .func("sum(_)")
        .unwrap()
        .call((vec![1.0_f64, 2.0, 3.0],))
        .unwrap();
    assert_eq!(total.get::<f64>().unwrap(), 6.0);
}

#[test]
fn unregistered_vector_argument_expands_to_a_list() {
    let vm = Vm::new();
    vm.module("inv", |m| {
        let mut k = m.klass::<Item>("Item")?;
        k.ctor(|| Item { id: 0.0 })
            .func_static("join", |parts: Vec<String>| parts.join("-"));
        Ok(())
    })
    .unwrap();
    let class = vm.find("inv", "Item").unwrap();
    let joined = class
        .func("join(_)")
        .unwrap()
        .call((vec!["a".to_string(), "b".to_string()],))
        .unwrap();
    assert_eq!(joined.get::<String>().unwrap(), "a-b");
}

#[test]
fn remove_and_insert_through_the_class() {
    let vm = Vm::new();
    vm.module("inv", |m| VecBindings::<f64>::bind(m, "DoubleVec"))
        .unwrap();
    let vec = vm
        .find("inv", "DoubleVec")
        .unwrap()
        .func("new()")
        .unwrap()
        .call(())
        .unwrap();
    let add = Callback::from_any(&vec, "add(_)").unwrap();
    for n in [1.0, 2.0, 3.0] {
        add.call((n,)).unwrap();
    }
    let insert = Callback::from_any(&vec, "insert(_,_)").unwrap();
    insert.call((-1.0, 4.0)).unwrap();
    let remove = Callback::from_any(&vec, "removeAt(_)").unwrap();
    assert_eq!(remove.call((0.0,)).unwrap().get::<f64>().unwrap(), 1.0);
    assert_eq!(vec.get::<Vec<f64>>().unwrap(), vec![2.0, 3.0, 4.0]);
}

#[test]
fn iteration_protocol_over_foreign_elements() {
    let vm = Vm::new();
    bind_inventory(&vm);
    let vec = vm
        .find("inv", "ItemVec")
        .unwrap()
        .func("new()")
        .unwrap()
        .call(())
        .unwrap();
    let add = Callback::from_any(&vec, "add(_)").unwrap();
    for id in [10.0, 20.0, 30.0] {
        add.call((Item { id },)).unwrap();
    }
    let iterate = Callback::from_any(&vec, "iterate(_)").unwrap();
    let value = Callback::from_any(&vec, "iteratorValue(_)").unwrap();
    // Walk the way a for loop would: null starts, false ends.
    let mut seen = Vec::new();
    let mut cursor: Option<f64> = None;
    loop {
        let step = iterate.call((cursor,)).unwrap();
        if step.is::<bool>() {
            assert!(!step.get::<bool>().unwrap());
            break;
        }
        let index = step.get::<f64>().unwrap();
        seen.push(value.call((index,)).unwrap().get::<Item>().unwrap().id);
        cursor = Some(index);
    }
    assert_eq!(seen, vec![10.0, 20.0, 30.0]);
}

#[test]
fn deque_binding_has_the_vector_surface() {
    let vm = Vm::new();
    vm.module("inv", |m| DequeBindings::<f64>::bind(m, "DoubleDeque"))
        .unwrap();
    let deque = vm
        .find("inv", "DoubleDeque")
        .unwrap()
        .func("new()")
        .unwrap()
        .call(())
        .unwrap();
    let add = Callback::from_any(&deque, "add(_)").unwrap();
    for n in [1.0, 2.0, 3.0] {
        add.call((n,)).unwrap();
    }
    let insert = Callback::from_any(&deque, "insert(_,_)").unwrap();
    insert.call((0.0, 0.5)).unwrap();
    let remove = Callback::from_any(&deque, "removeAt(_)").unwrap();
    assert_eq!(remove.call((-1.0,)).unwrap().get::<f64>().unwrap(), 3.0);
    let size = Callback::from_any(&deque, "size()").unwrap();
    assert_eq!(size.call(()).unwrap().get::<f64>().unwrap(), 3.0);
    let get = Callback::from_any(&deque, "[_]").unwrap();
    assert_eq!(get.call((0.0,)).unwrap().get::<f64>().unwrap(), 0.5);
    let set = Callback::from_any(&deque, "[_]=(_)").unwrap();
    set.call((0.0, 9.0)).unwrap();
    assert_eq!(get.call((0.0,)).unwrap().get::<f64>().unwrap(), 9.0);
    let contains = Callback::from_any(&deque, "contains(_)").unwrap();
    assert!(contains.call((2.0,)).unwrap().get::<bool>().unwrap());
}

#[test]
fn deque_iteration_protocol() {
    let vm = Vm::new();
    vm.module("inv", |m| DequeBindings::<f64>::bind(m, "DoubleDeque"))
        .unwrap();
    let deque = vm
        .find("inv", "DoubleDeque")
        .unwrap()
        .func("new()")
        .unwrap()
        .call(())
        .unwrap();
    let iterate = Callback::from_any(&deque, "iterate(_)").unwrap();
    let empty = iterate.call((Option::<f64>::None,)).unwrap();
    assert!(!empty.get::<bool>().unwrap());
    let add = Callback::from_any(&deque, "add(_)").unwrap();
    add.call((5.0,)).unwrap();
    add.call((6.0,)).unwrap();
    let value = Callback::from_any(&deque, "iteratorValue(_)").unwrap();
    let first = iterate.call((Option::<f64>::None,)).unwrap();
    assert_eq!(first.get::<f64>().unwrap(), 0.0);
    assert_eq!(value.call((0.0,)).unwrap().get::<f64>().unwrap(), 5.0);
    let second = iterate.call((Some(0.0),)).unwrap();
    assert_eq!(second.get::<f64>().unwrap(), 1.0);
    assert_eq!(value.call((1.0,)).unwrap().get::<f64>().unwrap(), 6.0);
    assert!(!iterate.call((Some(1.0),)).unwrap().get::<bool>().unwrap());
}

#[test]
fn returned_vector_is_the_registered_class() {
    let vm = Vm::new();
    vm.module("inv", |m| {
        VecBindings::<f64>::bind(m, "DoubleVec")?;
        let mut k = m.klass::<Item>("Item")?;
        k.ctor(|| Item { id: 0.0 })
            .func_static("range", |n: f64| -> Vec<f64> {
                (0..n as usize).map(|i| i as f64).collect()
            });
        Ok(())
    })
    .unwrap();
    let class = vm.find("inv", "Item").unwrap();
    let range = class.func("range(_)").unwrap().call((3.0,)).unwrap();
    // The result answers the vector class's methods.
    let size = Callback::from_any(&range, "size()").unwrap();
    assert_eq!(size.call(()).unwrap().get::<f64>().unwrap(), 3.0);
    assert_eq!(range.get::<Vec<f64>>().unwrap(), vec![0.0, 1.0, 2.0]);
}
