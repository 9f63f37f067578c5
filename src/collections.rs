//! Ready-made container bindings.
//!
//! [`VecBindings`] registers `Vec<T>` as a first-class script class with the
//! usual sequence surface: `add`, `insert`, `removeAt`, `contains`, `pop`,
//! `clear`, `size`, a read-only `count` property, the index operators and the
//! `iterate`/`iteratorValue` iteration protocol. Once registered, vectors of
//! that element type cross the boundary as foreign objects instead of
//! expanding into script lists. [`DequeBindings`] exposes the same surface
//! over `VecDeque<T>`.
//!
//! `insert` and `removeAt` take negative indices counting from the back;
//! `-1` means append and remove-last respectively.
//!
//! The iteration protocol follows the VM's contract: `iterate(null)` returns
//! the first index, `iterate(i)` the next, `false` when the container is
//! empty or exhausted; `iteratorValue(i)` yields the element at `i`.

use std::collections::VecDeque;
use std::marker::PhantomData;

use thiserror::Error;

use crate::error::{BindError, CastError};
use crate::marshal::{Frame, PopValue, PushValue};
use crate::module::ModuleBuilder;
use crate::operator::Operator;

/// Raised by the container methods on an out-of-range index.
#[derive(Debug, Error)]
#[error("invalid index")]
pub struct IndexOutOfRange;

/// One iteration step: the next index, or `false` when exhausted.
enum IterStep {
    Next(f64),
    Done,
}

impl PushValue for IterStep {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        match self {
            IterStep::Next(index) => index.push(frame, idx),
            IterStep::Done => false.push(frame, idx),
        }
    }
}

fn iterate_step(len: usize, prev: Option<f64>) -> IterStep {
    match prev {
        None if len == 0 => IterStep::Done,
        None => IterStep::Next(0.0),
        Some(i) if (i as usize) + 1 < len => IterStep::Next(i + 1.0),
        Some(_) => IterStep::Done,
    }
}

/// Registration helper for `Vec<T>` classes.
pub struct VecBindings<T>(PhantomData<T>);

impl<T> VecBindings<T>
where
    T: PushValue + PopValue + Clone + PartialEq + 'static,
{
    /// Bind `Vec<T>` under the given class name.
    pub fn bind(m: &mut ModuleBuilder<'_>, name: &str) -> Result<(), BindError> {
        let mut k = m.klass::<Vec<T>>(name)?;
        k.ctor(Vec::<T>::new)
            .func("add", |v: &mut Vec<T>, value: T| v.push(value))
            .func(
                "insert",
                |v: &mut Vec<T>, index: f64, value: T| -> Result<(), IndexOutOfRange> {
                    Self::insert_at(v, index as i64, value)
                },
            )
            .func(
                "removeAt",
                |v: &mut Vec<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    Self::remove_at(v, index as i64)
                },
            )
            .func("contains", |v: &Vec<T>, value: T| v.contains(&value))
            .func("pop", |v: &mut Vec<T>| -> Result<T, IndexOutOfRange> {
                v.pop().ok_or(IndexOutOfRange)
            })
            .func("clear", |v: &mut Vec<T>| v.clear())
            .func("size", |v: &Vec<T>| v.len() as f64)
            .prop_readonly("count", |v: &Vec<T>| v.len() as f64)
            .func("iterate", |v: &Vec<T>, prev: Option<f64>| {
                iterate_step(v.len(), prev)
            })
            .func(
                "iteratorValue",
                |v: &Vec<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    v.get(index as usize).cloned().ok_or(IndexOutOfRange)
                },
            )
            .func_op(
                Operator::GetIndex,
                |v: &Vec<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    v.get(index as usize).cloned().ok_or(IndexOutOfRange)
                },
            )?
            .func_op(
                Operator::SetIndex,
                |v: &mut Vec<T>, index: f64, value: T| -> Result<(), IndexOutOfRange> {
                    let slot = v.get_mut(index as usize).ok_or(IndexOutOfRange)?;
                    *slot = value;
                    Ok(())
                },
            )?;
        Ok(())
    }

    fn insert_at(v: &mut Vec<T>, index: i64, value: T) -> Result<(), IndexOutOfRange> {
        if index == -1 {
            v.push(value);
            return Ok(());
        }
        let index = if index < 0 {
            index + v.len() as i64
        } else {
            index
        };
        if index < 0 || index as usize > v.len() {
            return Err(IndexOutOfRange);
        }
        v.insert(index as usize, value);
        Ok(())
    }

    fn remove_at(v: &mut Vec<T>, index: i64) -> Result<T, IndexOutOfRange> {
        if index == -1 {
            return v.pop().ok_or(IndexOutOfRange);
        }
        let index = if index < 0 {
            index + v.len() as i64
        } else {
            index
        };
        if index < 0 || index as usize >= v.len() {
            return Err(IndexOutOfRange);
        }
        Ok(v.remove(index as usize))
    }
}

/// Registration helper for `VecDeque<T>` classes.
pub struct DequeBindings<T>(PhantomData<T>);

impl<T> DequeBindings<T>
where
    T: PushValue + PopValue + Clone + PartialEq + 'static,
{
    /// Bind `VecDeque<T>` under the given class name.
    pub fn bind(m: &mut ModuleBuilder<'_>, name: &str) -> Result<(), BindError> {
        let mut k = m.klass::<VecDeque<T>>(name)?;
        k.ctor(VecDeque::<T>::new)
            .func("add", |v: &mut VecDeque<T>, value: T| v.push_back(value))
            .func(
                "insert",
                |v: &mut VecDeque<T>, index: f64, value: T| -> Result<(), IndexOutOfRange> {
                    Self::insert_at(v, index as i64, value)
                },
            )
            .func(
                "removeAt",
                |v: &mut VecDeque<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    Self::remove_at(v, index as i64)
                },
            )
            .func("contains", |v: &VecDeque<T>, value: T| v.contains(&value))
            .func(
                "pop",
                |v: &mut VecDeque<T>| -> Result<T, IndexOutOfRange> {
                    v.pop_back().ok_or(IndexOutOfRange)
                },
            )
            .func("clear", |v: &mut VecDeque<T>| v.clear())
            .func("size", |v: &VecDeque<T>| v.len() as f64)
            .prop_readonly("count", |v: &VecDeque<T>| v.len() as f64)
            .func("iterate", |v: &VecDeque<T>, prev: Option<f64>| {
                iterate_step(v.len(), prev)
            })
            .func(
                "iteratorValue",
                |v: &VecDeque<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    v.get(index as usize).cloned().ok_or(IndexOutOfRange)
                },
            )
            .func_op(
                Operator::GetIndex,
                |v: &VecDeque<T>, index: f64| -> Result<T, IndexOutOfRange> {
                    v.get(index as usize).cloned().ok_or(IndexOutOfRange)
                },
            )?
            .func_op(
                Operator::SetIndex,
                |v: &mut VecDeque<T>, index: f64, value: T| -> Result<(), IndexOutOfRange> {
                    let slot = v.get_mut(index as usize).ok_or(IndexOutOfRange)?;
                    *slot = value;
                    Ok(())
                },
            )?;
        Ok(())
    }

    fn insert_at(v: &mut VecDeque<T>, index: i64, value: T) -> Result<(), IndexOutOfRange> {
        if index == -1 {
            v.push_back(value);
            return Ok(());
        }
        let index = if index < 0 {
            index + v.len() as i64
        } else {
            index
        };
        if index < 0 || index as usize > v.len() {
            return Err(IndexOutOfRange);
        }
        v.insert(index as usize, value);
        Ok(())
    }

    fn remove_at(v: &mut VecDeque<T>, index: i64) -> Result<T, IndexOutOfRange> {
        if index == -1 {
            return v.pop_back().ok_or(IndexOutOfRange);
        }
        let index = if index < 0 {
            index + v.len() as i64
        } else {
            index
        };
        if index < 0 || index as usize >= v.len() {
            return Err(IndexOutOfRange);
        }
        v.remove(index as usize).ok_or(IndexOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Vm;

    fn vm_with_doubles() -> Vm {
        let vm = Vm::new();
        vm.module("containers", |m| VecBindings::<f64>::bind(m, "DoubleVec"))
            .unwrap();
        vm
    }

    #[test]
    fn registered_vector_is_a_class() {
        let vm = vm_with_doubles();
        let source = vm.module_source("containers").unwrap();
        assert!(source.contains("foreign class DoubleVec {"));
        assert!(source.contains("foreign add(arg0)"));
        assert!(source.contains("foreign iterate(arg0)"));
        assert!(source.contains("foreign iteratorValue(arg0)"));
        assert!(source.contains("foreign [index]"));
        assert!(source.contains("foreign [index]=(rhs)"));
        assert!(source.contains("foreign count"));
    }

    #[test]
    fn add_size_and_index() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let items = crate::handle::Callback::from_any(&vec, "add(_)").unwrap();
        items.call((1.5,)).unwrap();
        items.call((2.5,)).unwrap();
        let size = crate::handle::Callback::from_any(&vec, "size()").unwrap();
        assert_eq!(size.call(()).unwrap().get::<f64>().unwrap(), 2.0);
        let get = crate::handle::Callback::from_any(&vec, "[_]").unwrap();
        assert_eq!(get.call((1.0,)).unwrap().get::<f64>().unwrap(), 2.5);
    }

    #[test]
    fn set_index_and_count_property() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let add = crate::handle::Callback::from_any(&vec, "add(_)").unwrap();
        add.call((1.0,)).unwrap();
        let set = crate::handle::Callback::from_any(&vec, "[_]=(_)").unwrap();
        set.call((0.0, 9.0)).unwrap();
        let count = crate::handle::Callback::from_any(&vec, "count").unwrap();
        assert_eq!(count.call(()).unwrap().get::<f64>().unwrap(), 1.0);
        assert_eq!(vec.get::<Vec<f64>>().unwrap(), vec![9.0]);
    }

    #[test]
    fn out_of_range_index_aborts() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let get = crate::handle::Callback::from_any(&vec, "[_]").unwrap();
        let err = get.call((4.0,)).unwrap_err();
        assert!(err.to_string().contains("invalid index"));
    }

    #[test]
    fn iteration_walks_every_index_then_stops() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let add = crate::handle::Callback::from_any(&vec, "add(_)").unwrap();
        add.call((1.5,)).unwrap();
        add.call((2.5,)).unwrap();
        let iterate = crate::handle::Callback::from_any(&vec, "iterate(_)").unwrap();
        let value = crate::handle::Callback::from_any(&vec, "iteratorValue(_)").unwrap();
        let first = iterate.call((Option::<f64>::None,)).unwrap();
        assert_eq!(first.get::<f64>().unwrap(), 0.0);
        assert_eq!(value.call((0.0,)).unwrap().get::<f64>().unwrap(), 1.5);
        let second = iterate.call((Some(0.0),)).unwrap();
        assert_eq!(second.get::<f64>().unwrap(), 1.0);
        assert_eq!(value.call((1.0,)).unwrap().get::<f64>().unwrap(), 2.5);
        let done = iterate.call((Some(1.0),)).unwrap();
        assert!(!done.get::<bool>().unwrap());
    }

    #[test]
    fn iterating_an_empty_vector_ends_immediately() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let iterate = crate::handle::Callback::from_any(&vec, "iterate(_)").unwrap();
        let step = iterate.call((Option::<f64>::None,)).unwrap();
        assert!(!step.get::<bool>().unwrap());
    }

    #[test]
    fn iterator_value_out_of_range_aborts() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let value = crate::handle::Callback::from_any(&vec, "iteratorValue(_)").unwrap();
        let err = value.call((0.0,)).unwrap_err();
        assert!(err.to_string().contains("invalid index"));
    }

    #[test]
    fn iterate_step_transitions() {
        assert!(matches!(iterate_step(0, None), IterStep::Done));
        assert!(matches!(iterate_step(2, None), IterStep::Next(i) if i == 0.0));
        assert!(matches!(iterate_step(2, Some(0.0)), IterStep::Next(i) if i == 1.0));
        assert!(matches!(iterate_step(2, Some(1.0)), IterStep::Done));
    }

    #[test]
    fn negative_insert_and_remove_semantics() {
        let mut v = vec![1.0_f64, 2.0, 3.0];
        VecBindings::<f64>::insert_at(&mut v, -1, 4.0).unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0, 4.0]);
        VecBindings::<f64>::insert_at(&mut v, -2, 9.0).unwrap();
        assert_eq!(v, vec![1.0, 2.0, 9.0, 3.0, 4.0]);
        assert_eq!(VecBindings::<f64>::remove_at(&mut v, -1).unwrap(), 4.0);
        assert_eq!(VecBindings::<f64>::remove_at(&mut v, -2).unwrap(), 9.0);
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
        assert!(VecBindings::<f64>::remove_at(&mut v, 5).is_err());
    }

    #[test]
    fn deque_negative_insert_and_remove_semantics() {
        let mut v: VecDeque<f64> = [1.0, 2.0, 3.0].into_iter().collect();
        DequeBindings::<f64>::insert_at(&mut v, -1, 4.0).unwrap();
        assert_eq!(v, [1.0, 2.0, 3.0, 4.0]);
        DequeBindings::<f64>::insert_at(&mut v, -2, 9.0).unwrap();
        assert_eq!(v, [1.0, 2.0, 9.0, 3.0, 4.0]);
        assert_eq!(DequeBindings::<f64>::remove_at(&mut v, -1).unwrap(), 4.0);
        assert_eq!(DequeBindings::<f64>::remove_at(&mut v, -2).unwrap(), 9.0);
        assert_eq!(v, [1.0, 2.0, 3.0]);
        assert!(DequeBindings::<f64>::remove_at(&mut v, 5).is_err());
    }

    #[test]
    fn contains_and_clear() {
        let vm = vm_with_doubles();
        let class = vm.find("containers", "DoubleVec").unwrap();
        let vec = class.func("new()").unwrap().call(()).unwrap();
        let add = crate::handle::Callback::from_any(&vec, "add(_)").unwrap();
        add.call((7.0,)).unwrap();
        let contains = crate::handle::Callback::from_any(&vec, "contains(_)").unwrap();
        assert!(contains.call((7.0,)).unwrap().get::<bool>().unwrap());
        assert!(!contains.call((8.0,)).unwrap().get::<bool>().unwrap());
        let clear = crate::handle::Callback::from_any(&vec, "clear()").unwrap();
        clear.call(()).unwrap();
        assert_eq!(vec.get::<Vec<f64>>().unwrap(), Vec::<f64>::new());
    }
}
