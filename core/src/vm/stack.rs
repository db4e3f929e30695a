use core::fmt;

/// Operand stack of one activation.
///
/// The maximum size comes from the method's verified `max_stack` and is
/// only enforced in debug builds: verification already guarantees the code
/// stays within it.
///
/// ```ignore
/// let mut stack = Stack::new(4);
/// stack.push(42);
/// stack.push(17);
/// assert_eq!(stack.pop(), Some(17));
/// assert_eq!(stack.peek(), Some(&42));
/// ```
pub struct Stack<T> {
    items: Vec<T>,
    max_size: usize,
}

impl<T> Stack<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    /// # Panics
    ///
    /// Panics in debug mode if the stack is already at maximum capacity.
    #[inline]
    pub fn push(&mut self, value: T) {
        debug_assert!(
            self.items.len() < self.max_size,
            "Stack overflow: max size {} exceeded",
            self.max_size
        );
        self.items.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Remove the top `n` elements and return them bottom to top, or `None`
    /// if fewer than `n` are present.
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<T>> {
        let len = self.items.len();
        if n > len {
            return None;
        }
        Some(self.items.split_off(len - n))
    }

    /// The top `n` elements, bottom to top.
    #[inline]
    pub fn top_n(&self, n: usize) -> Option<&[T]> {
        let len = self.items.len();
        if n > len {
            None
        } else {
            Some(&self.items[len - n..])
        }
    }
}

impl<T: Clone> Stack<T> {
    /// Duplicates the top element. Returns `false` if the stack is empty.
    #[inline]
    pub fn dup(&mut self) -> bool {
        if let Some(value) = self.peek().cloned() {
            self.push(value);
            true
        } else {
            false
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("items", &self.items)
            .field("max_size", &self.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new(100);
        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(stack.top_n(3), Some(&[1, 2, 3][..]));
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.peek(), None);
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut stack = Stack::new(100);
        for i in 1..=4 {
            stack.push(i * 10);
        }

        assert_eq!(stack.top_n(2), Some(&[30, 40][..]));
        assert_eq!(stack.pop_n(3), Some(vec![20, 30, 40]));
        assert_eq!(stack.peek(), Some(&10));
        assert_eq!(stack.pop_n(2), None);
        assert_eq!(stack.top_n(1), Some(&[10][..]));
    }

    #[test]
    fn test_dup() {
        let mut stack = Stack::new(2);
        assert!(!stack.dup());
        stack.push(7);
        assert!(stack.dup());
        assert_eq!(stack.pop_n(2), Some(vec![7, 7]));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Stack overflow")]
    fn test_overflow_panics_in_debug() {
        let mut stack = Stack::new(1);
        stack.push(1);
        stack.push(2);
    }
}
